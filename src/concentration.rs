//! Concentration risk
//!
//! Scores how much of the portfolio sits in a few positions using the
//! Herfindahl-Hirschman Index (HHI = Σ w_i²) and the cumulative weight of
//! the largest holdings.

use crate::holdings::HoldingWeight;
use crate::Analysis;
use serde::{Deserialize, Serialize};

/// HHI contribution to the score (HHI of 1.0 alone scores 100)
pub const HHI_SCORE_FACTOR: f64 = 100.0;

/// Top-5 weight contribution to the score
pub const TOP5_SCORE_FACTOR: f64 = 50.0;

pub const MAX_SCORE: f64 = 100.0;

/// Scores strictly above this are `High`
pub const HIGH_THRESHOLD: f64 = 70.0;

/// Scores at or above this (up to `HIGH_THRESHOLD`) are `Moderate`
pub const MODERATE_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    Low,
    Moderate,
    High,
}

impl ConcentrationLevel {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_THRESHOLD {
            ConcentrationLevel::High
        } else if score >= MODERATE_THRESHOLD {
            ConcentrationLevel::Moderate
        } else {
            ConcentrationLevel::Low
        }
    }
}

/// Concentration analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationResult {
    /// Herfindahl-Hirschman Index, 1/n (equal weights) to 1.0 (single holding)
    pub hhi: f64,

    /// Cumulative weight of the five largest holdings
    pub top5_weight: f64,

    /// Cumulative weight of the ten largest holdings
    pub top10_weight: f64,

    /// Score in [0, 100]
    pub score: f64,

    pub level: ConcentrationLevel,

    /// Largest holdings by weight, descending (at most five)
    pub largest_holdings: Vec<HoldingWeight>,
}

/// Concentration analyzer
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcentrationAnalyzer;

impl ConcentrationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze holding weights
    ///
    /// An empty portfolio has no concentration to measure and yields
    /// `NotApplicable`.
    pub fn analyze(&self, weights: &[HoldingWeight]) -> Analysis<ConcentrationResult> {
        if weights.is_empty() {
            return Analysis::NotApplicable("portfolio has no holdings".to_string());
        }

        let mut sorted: Vec<HoldingWeight> = weights.to_vec();
        sorted.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        let hhi = herfindahl_index(weights);
        let top5_weight = top_n_weight(&sorted, 5);
        let top10_weight = top_n_weight(&sorted, 10);
        let score = concentration_score(hhi, top5_weight);
        let level = ConcentrationLevel::from_score(score);

        tracing::debug!(
            holdings = weights.len(),
            hhi,
            top5_weight,
            score,
            level = ?level,
            "Analyzed concentration"
        );

        sorted.truncate(5);
        Analysis::Applicable(ConcentrationResult {
            hhi,
            top5_weight,
            top10_weight,
            score,
            level,
            largest_holdings: sorted,
        })
    }
}

/// HHI = Σ w_i²
pub fn herfindahl_index(weights: &[HoldingWeight]) -> f64 {
    weights.iter().map(|w| w.weight * w.weight).sum()
}

/// Score = min(100, HHI × 100 + top5 × 50)
pub fn concentration_score(hhi: f64, top5_weight: f64) -> f64 {
    (hhi * HHI_SCORE_FACTOR + top5_weight * TOP5_SCORE_FACTOR).min(MAX_SCORE)
}

fn top_n_weight(sorted_desc: &[HoldingWeight], n: usize) -> f64 {
    sorted_desc.iter().take(n).map(|w| w.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holdings::Holding;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn weights(values: &[f64]) -> Vec<HoldingWeight> {
        let holdings: Vec<Holding> = values
            .iter()
            .enumerate()
            .map(|(i, v)| Holding::with_value(format!("H{}", i), *v))
            .collect();
        HoldingWeight::from_holdings(&holdings).unwrap()
    }

    #[test]
    fn test_two_holding_example() {
        // 30,000 and 10,000: weights 0.75 / 0.25
        let result = ConcentrationAnalyzer::new()
            .analyze(&weights(&[30_000.0, 10_000.0]))
            .applicable()
            .unwrap();

        assert_relative_eq!(result.hhi, 0.625, epsilon = 1e-12);
        assert_relative_eq!(result.top5_weight, 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.score, 100.0);
        assert_eq!(result.level, ConcentrationLevel::High);
        assert_eq!(result.largest_holdings[0].instrument_id, "H0");
    }

    #[test]
    fn test_diversified_portfolio() {
        let result = ConcentrationAnalyzer::new()
            .analyze(&weights(&[1.0; 20]))
            .applicable()
            .unwrap();

        assert_relative_eq!(result.hhi, 0.05, epsilon = 1e-12);
        assert_relative_eq!(result.top5_weight, 0.25, epsilon = 1e-12);
        assert_relative_eq!(result.top10_weight, 0.5, epsilon = 1e-12);
        // 5 + 12.5
        assert_relative_eq!(result.score, 17.5, epsilon = 1e-9);
        assert_eq!(result.level, ConcentrationLevel::Low);
        assert_eq!(result.largest_holdings.len(), 5);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(ConcentrationLevel::from_score(70.0), ConcentrationLevel::Moderate);
        assert_eq!(ConcentrationLevel::from_score(70.01), ConcentrationLevel::High);
        assert_eq!(ConcentrationLevel::from_score(40.0), ConcentrationLevel::Moderate);
        assert_eq!(ConcentrationLevel::from_score(39.99), ConcentrationLevel::Low);
    }

    #[test]
    fn test_empty_holdings_not_applicable() {
        let result = ConcentrationAnalyzer::new().analyze(&[]);
        assert!(matches!(result, Analysis::NotApplicable(_)));
    }

    proptest! {
        #[test]
        fn prop_merging_holdings_never_lowers_hhi(
            values in prop::collection::vec(1.0f64..10_000.0, 2..30),
            i in 0usize..30,
            j in 0usize..30,
        ) {
            let n = values.len();
            let (i, j) = (i % n, j % n);
            prop_assume!(i != j);

            let before = weights(&values);
            let mut merged_values: Vec<f64> = values.clone();
            merged_values[i] += merged_values[j];
            merged_values.remove(j);
            let after = weights(&merged_values);

            let analyzer = ConcentrationAnalyzer::new();
            let before = analyzer.analyze(&before).applicable().unwrap();
            let after = analyzer.analyze(&after).applicable().unwrap();

            prop_assert!(after.hhi >= before.hhi - 1e-12);
            prop_assert!(after.score >= before.score - 1e-9);
        }
    }
}
