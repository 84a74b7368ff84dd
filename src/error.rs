//! Error types for the risk analytics engine

use thiserror::Error;

/// Errors that abort a single assessment call.
///
/// Numerically degenerate inputs (zero volatility, a single holding, a
/// missing benchmark) are not errors; they surface as
/// [`MetricValue::Undefined`](crate::MetricValue) or
/// [`Analysis::NotApplicable`](crate::Analysis) instead.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Insufficient data for {series}: need at least {required} observations, got {found}")]
    InsufficientData {
        series: String,
        required: usize,
        found: usize,
    },

    #[error("Misaligned calendars: {0}")]
    MisalignedCalendar(String),

    #[error("Invalid scenario '{scenario}': {reason}")]
    InvalidScenario { scenario: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid confidence level: {0} (must be between 0 and 1)")]
    InvalidConfidenceLevel(f64),

    #[error("Invalid time horizon: {0} (must be positive)")]
    InvalidTimeHorizon(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Assessment task failed: {0}")]
    Task(String),
}

impl RiskError {
    pub(crate) fn insufficient(series: impl Into<String>, required: usize, found: usize) -> Self {
        RiskError::InsufficientData {
            series: series.into(),
            required,
            found,
        }
    }

    pub(crate) fn invalid_scenario(scenario: &str, reason: impl Into<String>) -> Self {
        RiskError::InvalidScenario {
            scenario: scenario.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
