//! Alert evaluation
//!
//! Checks a risk profile and optional stress results against the configured
//! limits and emits typed, write-once alerts. A condition that no longer
//! holds produces a separate `Cleared` alert rather than an edit of the
//! earlier one.

use crate::error::Result;
use crate::metrics::MetricValue;
use crate::policy::{AlertPolicyConfig, AlertSeverity, LimitRule};
use crate::profile::RiskProfile;
use crate::stress::StressTestResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Metric name used for risk score alerts
pub const PORTFOLIO_RISK_SCORE: &str = "portfolio_risk_score";

/// Metric name used for concentration alerts
pub const CONCENTRATION_SCORE: &str = "concentration_score";

/// Metric name used for correlation alerts
pub const AVERAGE_CORRELATION: &str = "average_correlation";

/// Kind of alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LimitBreach,
    CorrelationSpike,
    ConcentrationHigh,
    StressFailure,
    Cleared,
}

/// A single risk alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,

    /// Triggering metric (stress alerts use `stress:<scenario>`)
    pub metric: String,
    pub threshold: f64,
    pub observed: f64,

    pub title: String,
    pub explanation: String,
    pub recommended_actions: Vec<String>,

    /// For `Cleared` alerts, the type of the condition that resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleared_type: Option<AlertType>,

    pub created_at: DateTime<Utc>,
}

impl RiskAlert {
    fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        metric: impl Into<String>,
        threshold: f64,
        observed: f64,
        title: impl Into<String>,
        explanation: String,
    ) -> Self {
        let metric = metric.into();
        Self {
            id: Uuid::new_v4(),
            recommended_actions: recommended_actions(alert_type, &metric),
            alert_type,
            severity,
            metric,
            threshold,
            observed,
            title: title.into(),
            explanation,
            cleared_type: None,
            created_at: Utc::now(),
        }
    }

    /// Identity of the condition this alert reports
    fn condition(&self) -> (AlertType, &str) {
        (self.alert_type, self.metric.as_str())
    }
}

/// Alert evaluation engine
///
/// Holds the loaded limits and evaluates assessments against them.
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    policy: AlertPolicyConfig,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(AlertPolicyConfig::default_limits())
    }
}

impl AlertEvaluator {
    pub fn new(policy: AlertPolicyConfig) -> Self {
        Self { policy }
    }

    /// Load limits from a YAML policy document
    ///
    /// # Example
    ///
    /// ```
    /// use portfolio_risk::AlertEvaluator;
    ///
    /// let yaml = r#"
    /// limits:
    ///   - type: ConcentrationLimit
    ///     max_score: 60.0
    /// "#;
    ///
    /// let evaluator = AlertEvaluator::from_yaml(yaml).unwrap();
    /// assert_eq!(evaluator.policy().limits.len(), 1);
    /// ```
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let policy: AlertPolicyConfig = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(Self::new(policy))
    }

    /// Load limits from a JSON policy document
    pub fn from_json(json: &str) -> Result<Self> {
        let policy: AlertPolicyConfig = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(Self::new(policy))
    }

    pub fn policy(&self) -> &AlertPolicyConfig {
        &self.policy
    }

    /// Evaluate all limits
    ///
    /// Alerts are ordered most severe first, keeping limit order within a
    /// severity. Undefined or missing metrics never raise an alert.
    pub fn evaluate(&self, profile: &RiskProfile, stress_results: &[StressTestResult]) -> Vec<RiskAlert> {
        let mut alerts = Vec::new();

        for rule in &self.policy.limits {
            match rule {
                LimitRule::MetricLimit {
                    metric,
                    max,
                    min,
                    absolute,
                    severity,
                } => {
                    let observed = match profile.metrics.get(metric) {
                        Some(MetricValue::Defined(v)) => v,
                        Some(MetricValue::Undefined(reason)) => {
                            tracing::debug!(metric = %metric, reason = ?reason, "Skipping undefined metric");
                            continue;
                        }
                        None => {
                            tracing::debug!(metric = %metric, "Skipping unavailable metric");
                            continue;
                        }
                    };
                    let compared = if *absolute { observed.abs() } else { observed };

                    if let Some(max) = max.filter(|&m| compared > m) {
                        alerts.push(RiskAlert::new(
                            AlertType::LimitBreach,
                            *severity,
                            metric.as_str(),
                            max,
                            observed,
                            format!("{} above limit", metric),
                            format!(
                                "{}{} of {:.4} exceeds the limit of {:.4}",
                                if *absolute { "|" } else { "" },
                                metric,
                                compared,
                                max
                            ),
                        ));
                    } else if let Some(min) = min.filter(|&m| compared < m) {
                        alerts.push(RiskAlert::new(
                            AlertType::LimitBreach,
                            *severity,
                            metric.as_str(),
                            min,
                            observed,
                            format!("{} below limit", metric),
                            format!(
                                "{}{} of {:.4} is below the floor of {:.4}",
                                if *absolute { "|" } else { "" },
                                metric,
                                compared,
                                min
                            ),
                        ));
                    }
                }

                LimitRule::RiskScoreLimit { max_score, severity } => {
                    if let Some(risk) = profile.portfolio_risk.as_ref().filter(|r| r.score > *max_score) {
                        alerts.push(RiskAlert::new(
                            AlertType::LimitBreach,
                            *severity,
                            PORTFOLIO_RISK_SCORE,
                            *max_score,
                            risk.score,
                            "High portfolio risk",
                            format!(
                                "Portfolio risk score is {:.1}, above the limit of {:.1}",
                                risk.score, max_score
                            ),
                        ));
                    }
                }

                LimitRule::ConcentrationLimit { max_score, severity } => {
                    if let Some(c) = profile
                        .concentration
                        .as_ref()
                        .applicable()
                        .filter(|c| c.score > *max_score)
                    {
                        alerts.push(RiskAlert::new(
                            AlertType::ConcentrationHigh,
                            *severity,
                            CONCENTRATION_SCORE,
                            *max_score,
                            c.score,
                            "High portfolio concentration",
                            format!(
                                "Concentration score is {:.1} (HHI {:.3}, top 5 holdings {:.1}%), above the limit of {:.1}",
                                c.score,
                                c.hhi,
                                c.top5_weight * 100.0,
                                max_score
                            ),
                        ));
                    }
                }

                LimitRule::CorrelationSpike { threshold, severity } => {
                    if let Some(c) = profile
                        .correlation
                        .as_ref()
                        .applicable()
                        .filter(|c| c.average_correlation > *threshold)
                    {
                        alerts.push(RiskAlert::new(
                            AlertType::CorrelationSpike,
                            *severity,
                            AVERAGE_CORRELATION,
                            *threshold,
                            c.average_correlation,
                            "High holding correlation",
                            format!(
                                "Average correlation is {:.2}, above {:.2}, reducing diversification benefits",
                                c.average_correlation, threshold
                            ),
                        ));
                    }
                }

                LimitRule::StressTolerance {
                    max_impact_pct,
                    severity,
                } => {
                    for result in stress_results
                        .iter()
                        .filter(|r| r.impact_percent.abs() > *max_impact_pct)
                    {
                        alerts.push(RiskAlert::new(
                            AlertType::StressFailure,
                            *severity,
                            format!("stress:{}", result.scenario_name),
                            *max_impact_pct,
                            result.impact_percent,
                            format!("{} exceeds stress tolerance", result.scenario_name),
                            format!(
                                "Scenario {} moves the portfolio by {:.1}% ({:.2}), beyond the {:.1}% tolerance",
                                result.scenario_name,
                                result.impact_percent,
                                result.impact_amount,
                                max_impact_pct
                            ),
                        ));
                    }
                }
            }
        }

        // Stable: limit order is preserved within a severity
        alerts.sort_by(|a, b| b.severity.cmp(&a.severity));

        if !alerts.is_empty() {
            tracing::info!(
                alerts = alerts.len(),
                critical = alerts.iter().filter(|a| a.severity == AlertSeverity::Critical).count(),
                "Risk limits breached"
            );
        }
        alerts
    }

    /// `Cleared` alerts for conditions in `previous` that are absent from
    /// `current`
    pub fn clearances(&self, previous: &[RiskAlert], current: &[RiskAlert]) -> Vec<RiskAlert> {
        let active: BTreeSet<(AlertType, &str)> = current.iter().map(RiskAlert::condition).collect();
        let mut seen = BTreeSet::new();

        previous
            .iter()
            .filter(|a| a.alert_type != AlertType::Cleared)
            .filter(|a| !active.contains(&a.condition()))
            .filter(|a| seen.insert(a.condition()))
            .map(|a| {
                let mut cleared = RiskAlert::new(
                    AlertType::Cleared,
                    AlertSeverity::Info,
                    a.metric.as_str(),
                    a.threshold,
                    a.observed,
                    format!("Resolved: {}", a.title),
                    format!(
                        "{} is no longer breached (last observed {:.4} against {:.4})",
                        a.metric, a.observed, a.threshold
                    ),
                );
                cleared.cleared_type = Some(a.alert_type);
                cleared
            })
            .collect()
    }
}

const RISK_SCORE_ACTIONS: &[&str] = &[
    "Consider reducing position sizes in high-risk assets",
    "Add defensive stocks or bonds to the portfolio",
    "Review and rebalance asset allocation",
    "Consider implementing stop-loss orders",
];

const VOLATILITY_ACTIONS: &[&str] = &[
    "Diversify across different sectors and asset classes",
    "Consider adding low-volatility stocks",
    "Implement systematic rebalancing",
    "Review position sizing strategy",
];

const DRAWDOWN_ACTIONS: &[&str] = &[
    "Review risk management strategy",
    "Consider implementing stop-loss orders",
    "Reduce overall portfolio risk",
    "Add hedging instruments if available",
];

const CONCENTRATION_ACTIONS: &[&str] = &[
    "Reduce position sizes in top holdings",
    "Add holdings from different sectors",
    "Consider index funds for instant diversification",
    "Implement maximum position size limits",
];

const CORRELATION_ACTIONS: &[&str] = &[
    "Add assets from different sectors/regions",
    "Consider alternative asset classes",
    "Review sector allocation",
    "Add international exposure if possible",
];

const STRESS_ACTIONS: &[&str] = &[
    "Hold an emergency cash buffer outside the portfolio",
    "Add assets that historically hold up in this scenario",
    "Reduce exposure to the holdings with the largest scenario losses",
];

const DEFAULT_ACTIONS: &[&str] = &["Review portfolio risk management strategy"];

const NO_ACTIONS: &[&str] = &[];

/// Recommended actions for an alert
pub fn recommended_actions(alert_type: AlertType, metric: &str) -> Vec<String> {
    let actions = match alert_type {
        AlertType::ConcentrationHigh => CONCENTRATION_ACTIONS,
        AlertType::CorrelationSpike => CORRELATION_ACTIONS,
        AlertType::StressFailure => STRESS_ACTIONS,
        AlertType::Cleared => NO_ACTIONS,
        AlertType::LimitBreach => match metric {
            PORTFOLIO_RISK_SCORE => RISK_SCORE_ACTIONS,
            "volatility" | "downside_deviation" | "tracking_error" => VOLATILITY_ACTIONS,
            "max_drawdown" | "max_drawdown_duration" => DRAWDOWN_ACTIONS,
            m if m.contains("var_") => DRAWDOWN_ACTIONS,
            _ => DEFAULT_ACTIONS,
        },
    };
    actions.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concentration::ConcentrationAnalyzer;
    use crate::correlation::CorrelationAnalyzer;
    use crate::holdings::HoldingWeight;
    use crate::metrics::RiskMetricsEngine;
    use crate::profile::{InvestorAssessment, RiskProfileAggregator};
    use crate::series::ReturnSeries;
    use crate::stress::{StressScenario, StressTestEngine};
    use crate::Analysis;
    use chrono::TimeZone;

    fn volatile_returns() -> Vec<f64> {
        (0..40)
            .map(|i| if i % 2 == 0 { 0.05 } else { -0.045 })
            .collect()
    }

    fn profile(returns: &[f64], weights: &[HoldingWeight]) -> RiskProfile {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let metrics = RiskMetricsEngine::default()
            .compute(&ReturnSeries::daily("portfolio", start, returns), None, &[0.95, 0.99], &[1])
            .unwrap();
        let concentration = ConcentrationAnalyzer::new().analyze(weights);
        let a: Vec<f64> = returns.to_vec();
        let b: Vec<f64> = returns.iter().map(|r| r * 0.9 + 0.001).collect();
        let correlation = CorrelationAnalyzer::new()
            .analyze_series(&[("A".to_string(), a), ("B".to_string(), b)]);
        RiskProfileAggregator::new()
            .aggregate(
                &InvestorAssessment {
                    capacity_score: Some(50.0),
                    ..Default::default()
                },
                &metrics,
                &concentration,
                &correlation,
            )
            .unwrap()
    }

    fn concentrated() -> Vec<HoldingWeight> {
        vec![HoldingWeight::new("ONLY", 1_000.0, 1.0)]
    }

    #[test]
    fn test_default_limits_on_volatile_portfolio() {
        let profile = profile(&volatile_returns(), &concentrated());
        let alerts = AlertEvaluator::default().evaluate(&profile, &[]);

        let types: Vec<AlertType> = alerts.iter().map(|a| a.alert_type).collect();
        assert!(types.contains(&AlertType::LimitBreach));
        assert!(types.contains(&AlertType::ConcentrationHigh));
        assert!(types.contains(&AlertType::CorrelationSpike));

        let vol = alerts.iter().find(|a| a.metric == "volatility").unwrap();
        assert_eq!(vol.threshold, 0.35);
        assert!(vol.observed > 0.35);
        assert_eq!(vol.recommended_actions.len(), 4);
    }

    #[test]
    fn test_alerts_sorted_by_severity() {
        let profile = profile(&volatile_returns(), &concentrated());
        let alerts = AlertEvaluator::default().evaluate(&profile, &[]);

        assert!(!alerts.is_empty());
        for pair in alerts.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
    }

    #[test]
    fn test_undefined_metric_never_alerts() {
        // Flat returns: Sharpe is undefined
        let profile = profile(&[0.0; 30], &concentrated());
        let evaluator = AlertEvaluator::from_yaml(
            r#"
limits:
  - type: MetricLimit
    metric: sharpe_ratio
    min: 0.5
  - type: MetricLimit
    metric: beta
    max: 1.2
"#,
        )
        .unwrap();

        assert!(evaluator.evaluate(&profile, &[]).is_empty());
    }

    #[test]
    fn test_absolute_metric_limit() {
        let profile = profile(&volatile_returns(), &concentrated());
        let evaluator = AlertEvaluator::from_yaml(
            r#"
limits:
  - type: MetricLimit
    metric: var_95_1d
    max: 0.02
    absolute: true
    severity: critical
"#,
        )
        .unwrap();

        let alerts = evaluator.evaluate(&profile, &[]);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].observed < 0.0);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_stress_failure() {
        let profile = profile(&volatile_returns(), &concentrated());
        let results = StressTestEngine::default()
            .run_all(&StressScenario::standard_set(), &profile.metrics, &concentrated())
            .unwrap();

        let evaluator = AlertEvaluator::from_json(
            r#"{ "limits": [ { "type": "StressTolerance", "max_impact_pct": 22.0 } ] }"#,
        )
        .unwrap();
        let alerts = evaluator.evaluate(&profile, &results);

        // Market crash (-30%) and liquidity crisis (-25%) exceed 22%
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.alert_type == AlertType::StressFailure));
        assert_eq!(alerts[0].metric, "stress:Market Crash");
    }

    #[test]
    fn test_correlation_threshold_override() {
        let profile = profile(&volatile_returns(), &concentrated());
        let evaluator = AlertEvaluator::from_yaml(
            r#"
limits:
  - type: CorrelationSpike
    threshold: 1.0
"#,
        )
        .unwrap();
        assert!(evaluator.evaluate(&profile, &[]).is_empty());
    }

    #[test]
    fn test_not_applicable_analyses_skip_alerts() {
        let mut profile = profile(&volatile_returns(), &concentrated());
        profile.concentration = Analysis::NotApplicable("no holdings".into());
        profile.correlation = Analysis::NotApplicable("one holding".into());

        let evaluator = AlertEvaluator::from_yaml(
            r#"
limits:
  - type: ConcentrationLimit
    max_score: 0.0
  - type: CorrelationSpike
    threshold: -1.0
"#,
        )
        .unwrap();
        assert!(evaluator.evaluate(&profile, &[]).is_empty());
    }

    #[test]
    fn test_clearances() {
        let evaluator = AlertEvaluator::default();
        let previous = evaluator.evaluate(&profile(&volatile_returns(), &concentrated()), &[]);

        let calm: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 0.002 } else { -0.001 }).collect();
        let current = evaluator.evaluate(&profile(&calm, &concentrated()), &[]);

        let cleared = evaluator.clearances(&previous, &current);
        assert!(!cleared.is_empty());
        assert!(cleared.iter().all(|a| a.alert_type == AlertType::Cleared));
        assert!(cleared.iter().all(|a| a.severity == AlertSeverity::Info));

        let vol = cleared.iter().find(|a| a.metric == "volatility").unwrap();
        assert_eq!(vol.cleared_type, Some(AlertType::LimitBreach));

        // Concentration is still high, so it is not cleared
        assert!(cleared.iter().all(|a| a.metric != CONCENTRATION_SCORE));

        // Nothing to clear against itself
        assert!(evaluator.clearances(&current, &current).is_empty());
    }

    #[test]
    fn test_invalid_policy_rejected() {
        assert!(AlertEvaluator::from_yaml("limits:\n  - type: StressTolerance\n    max_impact_pct: -5\n").is_err());
        assert!(AlertEvaluator::from_yaml("limits: [ { type: Unknown } ]").is_err());
    }

    #[test]
    fn test_recommended_actions_table() {
        assert_eq!(recommended_actions(AlertType::LimitBreach, PORTFOLIO_RISK_SCORE).len(), 4);
        assert_eq!(
            recommended_actions(AlertType::LimitBreach, "var_99_1d"),
            recommended_actions(AlertType::LimitBreach, "max_drawdown")
        );
        assert_eq!(
            recommended_actions(AlertType::LimitBreach, "calmar_ratio"),
            vec!["Review portfolio risk management strategy".to_string()]
        );
        assert!(recommended_actions(AlertType::Cleared, "volatility").is_empty());
    }
}
