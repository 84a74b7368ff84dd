//! Engine configuration
//!
//! All sections can be loaded from YAML or JSON; omitted fields fall back to
//! the defaults below.

use crate::error::{Result, RiskError};
use crate::stress::RecoveryModel;
use serde::{Deserialize, Serialize};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Return series construction
    #[serde(default)]
    pub series: SeriesConfig,

    /// Risk metric calculation
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Stress testing
    #[serde(default)]
    pub stress: StressConfig,

    /// Batch parallelism
    #[serde(default)]
    pub parallel: ParallelConfig,
}

/// Return series construction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Number of most recent returns kept after alignment
    #[serde(default = "default_lookback_periods")]
    pub lookback_periods: usize,

    /// Minimum aligned returns required per series
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

/// Risk metric settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Periods per year used for annualization (252 for daily data)
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,

    /// Annualized risk-free rate
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// VaR/CVaR confidence levels
    #[serde(default = "default_confidence_levels")]
    pub confidence_levels: Vec<f64>,

    /// VaR/CVaR horizons in days
    #[serde(default = "default_horizons_days")]
    pub horizons_days: Vec<u32>,
}

/// Stress testing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressConfig {
    /// Exposure assumed for holdings whose currency is unknown
    #[serde(default = "default_foreign_exposure")]
    pub default_foreign_exposure: f64,

    /// Recovery estimation model
    #[serde(default)]
    pub recovery_model: RecoveryModel,
}

/// Batch parallelism settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Allow parallel execution when the `parallel` feature is compiled in
    #[serde(default = "default_parallel_enabled")]
    pub enabled: bool,

    /// Minimum batch size before work is spread across threads
    #[serde(default = "default_parallel_threshold")]
    pub threshold: usize,
}

impl ParallelConfig {
    /// Whether a batch of `len` items should be processed in parallel
    pub fn should_parallelize(&self, len: usize) -> bool {
        self.enabled && len >= self.threshold
    }
}

impl EngineConfig {
    /// Load configuration from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.series.lookback_periods < 2 {
            return Err(RiskError::Config(format!(
                "lookback_periods must be at least 2, got {}",
                self.series.lookback_periods
            )));
        }
        if self.series.min_observations < 2 {
            return Err(RiskError::Config(format!(
                "min_observations must be at least 2, got {}",
                self.series.min_observations
            )));
        }
        if !(self.metrics.periods_per_year > 0.0) {
            return Err(RiskError::Config(
                "periods_per_year must be positive".to_string(),
            ));
        }
        if !self.metrics.risk_free_rate.is_finite() {
            return Err(RiskError::Config("risk_free_rate must be finite".to_string()));
        }
        for &c in &self.metrics.confidence_levels {
            if c <= 0.0 || c >= 1.0 || c.is_nan() {
                return Err(RiskError::InvalidConfidenceLevel(c));
            }
        }
        if self.metrics.horizons_days.contains(&0) {
            return Err(RiskError::InvalidTimeHorizon(0));
        }
        if !(0.0..=1.0).contains(&self.stress.default_foreign_exposure) {
            return Err(RiskError::Config(format!(
                "default_foreign_exposure must be within [0, 1], got {}",
                self.stress.default_foreign_exposure
            )));
        }
        Ok(())
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            lookback_periods: default_lookback_periods(),
            min_observations: default_min_observations(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: default_periods_per_year(),
            risk_free_rate: default_risk_free_rate(),
            confidence_levels: default_confidence_levels(),
            horizons_days: default_horizons_days(),
        }
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            default_foreign_exposure: default_foreign_exposure(),
            recovery_model: RecoveryModel::default(),
        }
    }
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: default_parallel_enabled(),
            threshold: default_parallel_threshold(),
        }
    }
}

// Default value functions
fn default_lookback_periods() -> usize {
    252
}

fn default_min_observations() -> usize {
    20
}

fn default_periods_per_year() -> f64 {
    252.0
}

fn default_risk_free_rate() -> f64 {
    0.06
}

fn default_confidence_levels() -> Vec<f64> {
    vec![0.95, 0.99]
}

fn default_horizons_days() -> Vec<u32> {
    vec![1, 10]
}

fn default_foreign_exposure() -> f64 {
    0.5
}

fn default_parallel_enabled() -> bool {
    true
}

fn default_parallel_threshold() -> usize {
    4
}
