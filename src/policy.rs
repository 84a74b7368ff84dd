//! Alert limit definitions
//!
//! Limits are supplied by the caller as a policy document, typically loaded
//! from YAML or JSON files.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};

/// Default average-correlation threshold for correlation spikes
pub const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.7;

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Complete alert policy
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AlertPolicyConfig {
    /// Limits to evaluate, in order
    #[serde(default)]
    pub limits: Vec<LimitRule>,
}

/// Individual limit types
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum LimitRule {
    /// Bound on a named metric of the metric set
    ///
    /// Breached when the observed value is above `max` or below `min`.
    /// With `absolute`, the magnitude of the value is compared instead.
    MetricLimit {
        metric: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,

        #[serde(default)]
        absolute: bool,

        #[serde(default = "default_warning")]
        severity: AlertSeverity,
    },

    /// Maximum portfolio risk score (0-100)
    RiskScoreLimit {
        max_score: f64,

        #[serde(default = "default_critical")]
        severity: AlertSeverity,
    },

    /// Maximum concentration score (0-100)
    ConcentrationLimit {
        max_score: f64,

        #[serde(default = "default_warning")]
        severity: AlertSeverity,
    },

    /// Maximum tolerated |impact%| of any stress scenario
    StressTolerance {
        max_impact_pct: f64,

        #[serde(default = "default_critical")]
        severity: AlertSeverity,
    },

    /// Maximum average pairwise correlation
    CorrelationSpike {
        #[serde(default = "default_correlation_threshold")]
        threshold: f64,

        #[serde(default = "default_warning")]
        severity: AlertSeverity,
    },
}

impl LimitRule {
    /// Get a human-readable name for this limit type
    pub fn name(&self) -> &'static str {
        match self {
            LimitRule::MetricLimit { .. } => "MetricLimit",
            LimitRule::RiskScoreLimit { .. } => "RiskScoreLimit",
            LimitRule::ConcentrationLimit { .. } => "ConcentrationLimit",
            LimitRule::StressTolerance { .. } => "StressTolerance",
            LimitRule::CorrelationSpike { .. } => "CorrelationSpike",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            LimitRule::MetricLimit { severity, .. }
            | LimitRule::RiskScoreLimit { severity, .. }
            | LimitRule::ConcentrationLimit { severity, .. }
            | LimitRule::StressTolerance { severity, .. }
            | LimitRule::CorrelationSpike { severity, .. } => *severity,
        }
    }

    fn validate(&self) -> Result<()> {
        let check = |field: &str, value: f64| -> Result<()> {
            if value.is_finite() {
                Ok(())
            } else {
                Err(RiskError::Config(format!(
                    "{}: {} must be finite",
                    self.name(),
                    field
                )))
            }
        };

        match self {
            LimitRule::MetricLimit {
                metric, max, min, ..
            } => {
                if metric.is_empty() {
                    return Err(RiskError::Config("MetricLimit: metric must be named".to_string()));
                }
                if max.is_none() && min.is_none() {
                    return Err(RiskError::Config(format!(
                        "MetricLimit for {}: needs max or min",
                        metric
                    )));
                }
                if let Some(max) = max {
                    check("max", *max)?;
                }
                if let Some(min) = min {
                    check("min", *min)?;
                }
            }
            LimitRule::RiskScoreLimit { max_score, .. }
            | LimitRule::ConcentrationLimit { max_score, .. } => check("max_score", *max_score)?,
            LimitRule::StressTolerance { max_impact_pct, .. } => {
                check("max_impact_pct", *max_impact_pct)?;
                if *max_impact_pct < 0.0 {
                    return Err(RiskError::Config(
                        "StressTolerance: max_impact_pct must not be negative".to_string(),
                    ));
                }
            }
            LimitRule::CorrelationSpike { threshold, .. } => {
                check("threshold", *threshold)?;
                if !(-1.0..=1.0).contains(threshold) {
                    return Err(RiskError::Config(format!(
                        "CorrelationSpike: threshold must be within [-1, 1], got {}",
                        threshold
                    )));
                }
            }
        }
        Ok(())
    }
}

impl AlertPolicyConfig {
    /// Check every limit
    pub fn validate(&self) -> Result<()> {
        self.limits.iter().try_for_each(LimitRule::validate)
    }

    /// Standard limits: risk score 80, volatility 35%, drawdown -25%,
    /// concentration 70, average correlation 0.7, stress loss 25%
    pub fn default_limits() -> Self {
        Self {
            limits: vec![
                LimitRule::RiskScoreLimit {
                    max_score: 80.0,
                    severity: AlertSeverity::Critical,
                },
                LimitRule::MetricLimit {
                    metric: "volatility".to_string(),
                    max: Some(0.35),
                    min: None,
                    absolute: false,
                    severity: AlertSeverity::Critical,
                },
                LimitRule::MetricLimit {
                    metric: "max_drawdown".to_string(),
                    max: None,
                    min: Some(-0.25),
                    absolute: false,
                    severity: AlertSeverity::Critical,
                },
                LimitRule::ConcentrationLimit {
                    max_score: 70.0,
                    severity: AlertSeverity::Warning,
                },
                LimitRule::CorrelationSpike {
                    threshold: DEFAULT_CORRELATION_THRESHOLD,
                    severity: AlertSeverity::Warning,
                },
                LimitRule::StressTolerance {
                    max_impact_pct: 25.0,
                    severity: AlertSeverity::Critical,
                },
            ],
        }
    }
}

impl Default for AlertPolicyConfig {
    fn default() -> Self {
        Self::default_limits()
    }
}

fn default_warning() -> AlertSeverity {
    AlertSeverity::Warning
}

fn default_critical() -> AlertSeverity {
    AlertSeverity::Critical
}

fn default_correlation_threshold() -> f64 {
    DEFAULT_CORRELATION_THRESHOLD
}
