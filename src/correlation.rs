//! Correlation analytics
//!
//! Pairwise Pearson correlation over the aligned holding return series,
//! with average and maximum off-diagonal correlation and the diversification
//! benefit derived from them.

use crate::metrics::{mean, sample_covariance, sample_variance};
use crate::series::AlignedReturns;
use crate::Analysis;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Pairs at or above this correlation are listed as highly correlated
pub const HIGH_CORRELATION_THRESHOLD: f64 = 0.7;

/// Variance at or below this marks a series as constant
const ZERO_VARIANCE: f64 = 1e-18;

/// Pair of holdings with their correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub correlation: f64,
}

/// Correlation analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Instrument ids in matrix row/column order
    pub instruments: Vec<String>,

    /// Pearson correlation matrix
    ///
    /// Rows and columns of constant series hold 0.0 off the diagonal; they
    /// are listed in `excluded` and take no part in the summary figures.
    pub matrix: DMatrix<f64>,

    /// Mean off-diagonal correlation over the included pairs
    pub average_correlation: f64,

    /// Largest off-diagonal correlation over the included pairs
    pub max_correlation: f64,

    /// clamp(1 - average correlation, 0, 1)
    pub diversification_benefit: f64,

    /// Included pairs at or above the high-correlation threshold, strongest first
    pub highly_correlated_pairs: Vec<CorrelatedPair>,

    /// Instruments with zero return variance
    pub excluded: Vec<String>,

    /// Observations per series
    pub observations: usize,
}

impl CorrelationResult {
    /// Correlation between two instruments, `None` if either is unknown or
    /// excluded
    pub fn correlation(&self, a: &str, b: &str) -> Option<f64> {
        if self.excluded.iter().any(|e| e == a || e == b) {
            return None;
        }
        let i = self.instruments.iter().position(|id| id == a)?;
        let j = self.instruments.iter().position(|id| id == b)?;
        Some(self.matrix[(i, j)])
    }
}

/// Correlation analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze the aligned holding series
    ///
    /// `NotApplicable` with fewer than two holdings, fewer than two
    /// observations, or when every pair involves a constant series.
    pub fn analyze(&self, aligned: &AlignedReturns) -> Analysis<CorrelationResult> {
        let series: Vec<(String, Vec<f64>)> = aligned
            .holdings()
            .map(|s| (s.instrument_id().to_string(), s.values()))
            .collect();
        self.analyze_series(&series)
    }

    /// Analyze named return vectors of equal length
    pub fn analyze_series(&self, series: &[(String, Vec<f64>)]) -> Analysis<CorrelationResult> {
        let n = series.len();
        if n < 2 {
            return Analysis::NotApplicable(format!(
                "correlation needs at least 2 holdings, got {}",
                n
            ));
        }

        let observations = series.iter().map(|(_, v)| v.len()).min().unwrap_or(0);
        if observations < 2 {
            return Analysis::NotApplicable(format!(
                "correlation needs at least 2 observations per holding, got {}",
                observations
            ));
        }

        let values: Vec<&[f64]> = series.iter().map(|(_, v)| &v[..observations]).collect();
        let variances: Vec<f64> = values.iter().map(|v| sample_variance(v)).collect();
        let constant: Vec<bool> = variances.iter().map(|&v| v <= ZERO_VARIANCE).collect();

        let mut matrix = DMatrix::identity(n, n);
        let mut pairs = Vec::new();

        for i in 0..n {
            for j in (i + 1)..n {
                if constant[i] || constant[j] {
                    continue;
                }
                let corr = (sample_covariance(values[i], values[j])
                    / (variances[i].sqrt() * variances[j].sqrt()))
                .clamp(-1.0, 1.0);
                matrix[(i, j)] = corr;
                matrix[(j, i)] = corr;
                pairs.push((i, j, corr));
            }
        }

        let excluded: Vec<String> = series
            .iter()
            .zip(&constant)
            .filter(|(_, &c)| c)
            .map(|((id, _), _)| id.clone())
            .collect();

        if pairs.is_empty() {
            return Analysis::NotApplicable(format!(
                "no pair without a constant series ({} excluded)",
                excluded.len()
            ));
        }
        if !excluded.is_empty() {
            tracing::warn!(excluded = ?excluded, "Excluding constant return series from correlation");
        }

        let correlations: Vec<f64> = pairs.iter().map(|&(_, _, c)| c).collect();
        let average_correlation = mean(&correlations);
        let max_correlation = correlations.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut highly_correlated_pairs: Vec<CorrelatedPair> = pairs
            .iter()
            .filter(|&&(_, _, c)| c >= HIGH_CORRELATION_THRESHOLD)
            .map(|&(i, j, correlation)| CorrelatedPair {
                first: series[i].0.clone(),
                second: series[j].0.clone(),
                correlation,
            })
            .collect();
        highly_correlated_pairs.sort_by(|a, b| b.correlation.total_cmp(&a.correlation));

        tracing::debug!(
            holdings = n,
            pairs = pairs.len(),
            average_correlation,
            max_correlation,
            "Analyzed correlation"
        );

        Analysis::Applicable(CorrelationResult {
            instruments: series.iter().map(|(id, _)| id.clone()).collect(),
            matrix,
            average_correlation,
            max_correlation,
            diversification_benefit: diversification_benefit(average_correlation),
            highly_correlated_pairs,
            excluded,
            observations,
        })
    }
}

/// clamp(1 - average correlation, 0, 1)
pub fn diversification_benefit(average_correlation: f64) -> f64 {
    (1.0 - average_correlation).clamp(0.0, 1.0)
}
