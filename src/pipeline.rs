//! End-to-end portfolio assessment
//!
//! Wires return construction, the three independent analyzers, stress
//! testing, profile aggregation and alert evaluation into one call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alerts::{AlertEvaluator, RiskAlert};
use crate::concentration::{ConcentrationAnalyzer, ConcentrationResult};
use crate::config::EngineConfig;
use crate::correlation::{CorrelationAnalyzer, CorrelationResult};
use crate::error::{Result, RiskError};
use crate::holdings::{Holding, HoldingWeight};
use crate::metrics::{RiskMetricSet, RiskMetricsEngine};
use crate::parallel::{maybe_join, maybe_parallel_map};
use crate::profile::{InvestorAssessment, RiskProfile, RiskProfileAggregator};
use crate::series::{PricePoint, ReturnSeriesBuilder};
use crate::stress::{StressScenario, StressTestEngine, StressTestReport, StressTestResult};
use crate::Analysis;

/// Everything needed to assess one portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub portfolio_id: String,

    pub holdings: Vec<Holding>,

    /// Price history per instrument, sorted by timestamp
    pub price_histories: BTreeMap<String, Vec<PricePoint>>,

    /// Optional benchmark id and price history
    #[serde(default)]
    pub benchmark: Option<(String, Vec<PricePoint>)>,

    #[serde(default)]
    pub investor: InvestorAssessment,

    /// Scenarios to run; the standard set when empty
    #[serde(default)]
    pub scenarios: Vec<StressScenario>,
}

/// Complete result of one assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub portfolio_id: String,
    pub weights: Vec<HoldingWeight>,
    pub metrics: RiskMetricSet,
    pub concentration: Analysis<ConcentrationResult>,
    pub correlation: Analysis<CorrelationResult>,
    pub stress_results: Vec<StressTestResult>,
    pub stress_report: StressTestReport,
    pub profile: RiskProfile,
    pub alerts: Vec<RiskAlert>,
}

/// Runs the assessment pipeline
#[derive(Debug, Clone)]
pub struct RiskAssessor {
    config: EngineConfig,
    builder: ReturnSeriesBuilder,
    metrics: RiskMetricsEngine,
    stress: StressTestEngine,
    alerts: AlertEvaluator,
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RiskAssessor {
    /// Create an assessor with the default alert limits
    pub fn new(config: EngineConfig) -> Self {
        Self {
            builder: ReturnSeriesBuilder::new(&config.series),
            metrics: RiskMetricsEngine::new(&config.metrics),
            stress: StressTestEngine::new(&config.stress),
            alerts: AlertEvaluator::default(),
            config,
        }
    }

    /// Replace the alert limits
    pub fn with_alerts(mut self, alerts: AlertEvaluator) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn alert_evaluator(&self) -> &AlertEvaluator {
        &self.alerts
    }

    /// Assess a single portfolio
    ///
    /// # Errors
    ///
    /// Any structural error from the stages: invalid holdings, a holding
    /// without price history, misaligned or too short histories, or an
    /// invalid scenario.
    pub fn assess(&self, request: &AssessmentRequest) -> Result<Assessment> {
        let weights = HoldingWeight::from_holdings(&request.holdings)?;

        let mut histories = BTreeMap::new();
        for weight in &weights {
            let prices = request
                .price_histories
                .get(&weight.instrument_id)
                .ok_or_else(|| {
                    RiskError::InvalidInput(format!(
                        "no price history for holding {}",
                        weight.instrument_id
                    ))
                })?;
            histories.insert(weight.instrument_id.clone(), prices.clone());
        }

        let benchmark = request
            .benchmark
            .as_ref()
            .map(|(id, prices)| (id.as_str(), prices.as_slice()));
        let aligned = self.builder.build(&histories, benchmark)?;
        let portfolio_returns = aligned.portfolio_returns(&weights)?;

        let parallel = &self.config.parallel;
        let (metrics, (concentration, correlation)) = maybe_join(
            parallel,
            || {
                self.metrics.compute(
                    &portfolio_returns,
                    aligned.benchmark(),
                    &self.config.metrics.confidence_levels,
                    &self.config.metrics.horizons_days,
                )
            },
            || {
                maybe_join(
                    parallel,
                    || ConcentrationAnalyzer::new().analyze(&weights),
                    || CorrelationAnalyzer::new().analyze(&aligned),
                )
            },
        );
        let metrics = metrics?;

        let standard;
        let scenarios = if request.scenarios.is_empty() {
            standard = StressScenario::standard_set();
            &standard
        } else {
            &request.scenarios
        };
        let stress_results = self.stress.run_all(scenarios, &metrics, &weights)?;
        let stress_report = self.stress.report(&stress_results)?;

        let profile = RiskProfileAggregator::new().aggregate(
            &request.investor,
            &metrics,
            &concentration,
            &correlation,
        )?;
        let alerts = self.alerts.evaluate(&profile, &stress_results);

        tracing::info!(
            portfolio = %request.portfolio_id,
            holdings = weights.len(),
            observations = aligned.observations(),
            overall_score = profile.overall_score,
            level = ?profile.level,
            alerts = alerts.len(),
            "Assessed portfolio"
        );

        Ok(Assessment {
            portfolio_id: request.portfolio_id.clone(),
            weights,
            metrics,
            concentration,
            correlation,
            stress_results,
            stress_report,
            profile,
            alerts,
        })
    }

    /// Assess independent portfolios, in parallel above the configured
    /// threshold
    ///
    /// Results are returned in request order; one failing portfolio does not
    /// affect the others.
    pub fn assess_many(&self, requests: &[AssessmentRequest]) -> Vec<Result<Assessment>> {
        let results = maybe_parallel_map(requests, &self.config.parallel, |request| {
            self.assess(request)
        });

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            tracing::warn!(
                portfolios = requests.len(),
                failed,
                "Some portfolio assessments failed"
            );
        }
        results
    }

    /// Alerts for conditions present in `previous` that no longer hold
    pub fn clearances(&self, previous: &Assessment, current: &Assessment) -> Vec<RiskAlert> {
        self.alerts.clearances(&previous.alerts, &current.alerts)
    }

    /// Run [`assess`](Self::assess) on the blocking thread pool
    #[cfg(feature = "async")]
    pub async fn assess_blocking(&self, request: AssessmentRequest) -> Result<Assessment> {
        let assessor = self.clone();
        tokio::task::spawn_blocking(move || assessor.assess(&request))
            .await
            .map_err(|e| RiskError::Task(e.to_string()))?
    }
}
