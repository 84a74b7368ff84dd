//! Value at Risk estimators
//!
//! All values are expressed in return space: a 95% one-day VaR of -0.021
//! means the portfolio loses more than 2.1% on one day in twenty.
//!
//! - Historical VaR: empirical (1 - c) percentile of the return distribution
//! - Parametric VaR: zero-mean normal quantile, z(1 - c) · σ
//! - CVaR (Expected Shortfall): mean of the returns at or below the VaR threshold
//!
//! Multi-day figures use the square-root-of-time rule (one-period value
//! × √horizon). This is an approximation that assumes i.i.d. returns; it is
//! not re-estimated from overlapping multi-day returns.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// VaR calculation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarMethod {
    Historical,
    Parametric,
    ExpectedShortfall,
}

/// Single VaR/CVaR estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarResult {
    /// Return threshold (negative for a loss)
    pub value: f64,

    /// Confidence level (e.g., 0.95, 0.99)
    pub confidence_level: f64,

    /// Time horizon in periods
    pub time_horizon_days: u32,

    /// Calculation method used
    pub method: VarMethod,
}

/// VaR calculator over one return sample
pub struct VarEngine {
    sorted_returns: Vec<f64>,
}

impl VarEngine {
    /// Create an engine from periodic returns
    ///
    /// # Errors
    ///
    /// `InvalidInput` if any return is not finite, `InsufficientData` if the
    /// sample is empty.
    pub fn with_historical_returns(returns: &[f64]) -> Result<Self> {
        if returns.is_empty() {
            return Err(RiskError::insufficient("returns", 1, 0));
        }
        if returns.iter().any(|r| !r.is_finite()) {
            return Err(RiskError::InvalidInput(
                "returns must be finite".to_string(),
            ));
        }

        let mut sorted_returns = returns.to_vec();
        sorted_returns.sort_by(f64::total_cmp);
        Ok(Self { sorted_returns })
    }

    /// Empirical percentile (q in [0, 1]) with linear interpolation between
    /// order statistics
    pub fn percentile(&self, q: f64) -> f64 {
        let n = self.sorted_returns.len();
        if n == 1 {
            return self.sorted_returns[0];
        }

        let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let fraction = rank - lower as f64;

        self.sorted_returns[lower] + fraction * (self.sorted_returns[upper] - self.sorted_returns[lower])
    }

    /// Historical VaR: (1 - c) percentile scaled by √horizon
    pub fn historical_var(&self, confidence_level: f64, time_horizon_days: u32) -> Result<VarResult> {
        validate_inputs(confidence_level, time_horizon_days)?;

        let threshold = self.percentile(1.0 - confidence_level);

        Ok(VarResult {
            value: threshold * time_scaling(time_horizon_days),
            confidence_level,
            time_horizon_days,
            method: VarMethod::Historical,
        })
    }

    /// Conditional VaR: mean of one-period returns at or below the one-period
    /// VaR threshold, scaled by √horizon
    pub fn cvar(&self, confidence_level: f64, time_horizon_days: u32) -> Result<VarResult> {
        validate_inputs(confidence_level, time_horizon_days)?;

        let threshold = self.percentile(1.0 - confidence_level);
        let tail: Vec<f64> = self
            .sorted_returns
            .iter()
            .take_while(|&&r| r <= threshold)
            .copied()
            .collect();

        // The minimum is always at or below an interpolated percentile
        let average_tail = if tail.is_empty() {
            self.sorted_returns[0]
        } else {
            tail.iter().sum::<f64>() / tail.len() as f64
        };

        Ok(VarResult {
            value: average_tail * time_scaling(time_horizon_days),
            confidence_level,
            time_horizon_days,
            method: VarMethod::ExpectedShortfall,
        })
    }
}

/// Parametric VaR assuming zero-mean normally distributed returns
///
/// Formula: VaR = z(1 - c) · σ_period · √T
pub fn parametric_var(
    period_volatility: f64,
    confidence_level: f64,
    time_horizon_days: u32,
) -> Result<VarResult> {
    validate_inputs(confidence_level, time_horizon_days)?;

    if !period_volatility.is_finite() || period_volatility < 0.0 {
        return Err(RiskError::InvalidInput(format!(
            "volatility must be a non-negative number, got {}",
            period_volatility
        )));
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| RiskError::InvalidInput(e.to_string()))?;
    let z_score = normal.inverse_cdf(1.0 - confidence_level);

    Ok(VarResult {
        value: z_score * period_volatility * time_scaling(time_horizon_days),
        confidence_level,
        time_horizon_days,
        method: VarMethod::Parametric,
    })
}

/// Metric name suffix for a confidence level / horizon pair, e.g. "95_1d"
pub fn metric_suffix(confidence_level: f64, time_horizon_days: u32) -> String {
    let pct = confidence_level * 100.0;
    let pct = if (pct - pct.round()).abs() < 1e-9 {
        format!("{}", pct.round() as i64)
    } else {
        format!("{}", pct).replace('.', "_")
    };
    format!("{}_{}d", pct, time_horizon_days)
}

fn time_scaling(time_horizon_days: u32) -> f64 {
    (time_horizon_days as f64).sqrt()
}

fn validate_inputs(confidence_level: f64, time_horizon_days: u32) -> Result<()> {
    if confidence_level <= 0.0 || confidence_level >= 1.0 || confidence_level.is_nan() {
        return Err(RiskError::InvalidConfidenceLevel(confidence_level));
    }

    if time_horizon_days == 0 {
        return Err(RiskError::InvalidTimeHorizon(time_horizon_days));
    }

    Ok(())
}
