//! # portfolio-risk: Portfolio Risk Analytics Engine
//!
//! This library computes risk analytics for investment portfolios from
//! holdings and historical price data.
//!
//! ## Core Components
//!
//! - **ReturnSeriesBuilder**: Aligns price histories and derives returns
//! - **RiskMetricsEngine**: Volatility, VaR/CVaR, drawdown, ratios, beta
//! - **ConcentrationAnalyzer / CorrelationAnalyzer**: Diversification analysis
//! - **StressTestEngine**: Scenario impact and recovery estimates
//! - **RiskProfileAggregator**: Investor and portfolio risk profile
//! - **AlertEvaluator**: YAML/JSON limit policies producing risk alerts
//! - **RiskAssessor**: End-to-end assessment pipeline
//!
//! ## Example Usage
//!
//! ```rust
//! use portfolio_risk::{
//!     EngineConfig, Holding, InvestorAssessment, PricePoint, RiskAssessor, AssessmentRequest,
//! };
//! use chrono::{Duration, TimeZone, Utc};
//! use std::collections::BTreeMap;
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let history = |drift: f64| -> Vec<PricePoint> {
//!     let mut price = 100.0;
//!     (0..60)
//!         .map(|i| {
//!             price *= 1.0 + drift + if i % 2 == 0 { 0.01 } else { -0.008 };
//!             PricePoint::new(start + Duration::days(i), price)
//!         })
//!         .collect()
//! };
//!
//! let mut price_histories = BTreeMap::new();
//! price_histories.insert("AAA".to_string(), history(0.001));
//! price_histories.insert("BBB".to_string(), history(0.002));
//!
//! let request = AssessmentRequest {
//!     portfolio_id: "demo".to_string(),
//!     holdings: vec![
//!         Holding::with_value("AAA", 60_000.0),
//!         Holding::with_value("BBB", 40_000.0),
//!     ],
//!     price_histories,
//!     benchmark: None,
//!     investor: InvestorAssessment {
//!         capacity_score: Some(60.0),
//!         ..Default::default()
//!     },
//!     scenarios: Vec::new(),
//! };
//!
//! let assessment = RiskAssessor::new(EngineConfig::default()).assess(&request).unwrap();
//! assert_eq!(assessment.stress_results.len(), 5);
//! assert!(assessment.profile.overall_score <= 100.0);
//! ```

pub mod alerts;
pub mod concentration;
pub mod config;
pub mod correlation;
pub mod error;
pub mod holdings;
pub mod metrics;
pub mod parallel;
pub mod pipeline;
pub mod policy;
pub mod profile;
pub mod series;
pub mod stress;
pub mod var;

pub use alerts::{AlertEvaluator, AlertType, RiskAlert};
pub use concentration::{ConcentrationAnalyzer, ConcentrationLevel, ConcentrationResult};
pub use config::{EngineConfig, MetricsConfig, ParallelConfig, SeriesConfig, StressConfig};
pub use correlation::{CorrelationAnalyzer, CorrelationResult};
pub use error::{Result, RiskError};
pub use holdings::{Holding, HoldingWeight, Valuation};
pub use metrics::{MetricValue, RiskMetricSet, RiskMetricsEngine, UndefinedReason};
pub use pipeline::{Assessment, AssessmentRequest, RiskAssessor};
pub use policy::{AlertPolicyConfig, AlertSeverity, LimitRule};
pub use profile::{
    InvestorAssessment, InvestorProfile, RiskLevel, RiskProfile, RiskProfileAggregator,
};
pub use series::{AlignedReturns, PricePoint, ReturnSeries, ReturnSeriesBuilder};
pub use stress::{
    RecoveryModel, ScenarioShock, StressScenario, StressTestEngine, StressTestReport,
    StressTestResult,
};
pub use var::{VarEngine, VarMethod, VarResult};

use serde::{Deserialize, Serialize};

/// Outcome of an analysis that may not apply to the input
///
/// A single-holding portfolio has no correlations, an empty one has no
/// concentration. These are reported as `NotApplicable` with a reason
/// rather than as errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum Analysis<T> {
    Applicable(T),
    NotApplicable(String),
}

impl<T> Analysis<T> {
    /// Consume the analysis, keeping the result if it applied
    pub fn applicable(self) -> Option<T> {
        match self {
            Analysis::Applicable(result) => Some(result),
            Analysis::NotApplicable(_) => None,
        }
    }

    pub fn as_ref(&self) -> Analysis<&T> {
        match self {
            Analysis::Applicable(result) => Analysis::Applicable(result),
            Analysis::NotApplicable(reason) => Analysis::NotApplicable(reason.clone()),
        }
    }

    pub fn is_applicable(&self) -> bool {
        matches!(self, Analysis::Applicable(_))
    }

    /// Why the analysis did not apply
    pub fn reason(&self) -> Option<&str> {
        match self {
            Analysis::Applicable(_) => None,
            Analysis::NotApplicable(reason) => Some(reason),
        }
    }
}

/// Initialize tracing subscriber for logging
///
/// Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
