//! Stress testing and scenario analysis
//!
//! Each scenario category maps to a deterministic shock formula applied to
//! the portfolio's current holdings:
//! - Market crash: `market_shock` applied directly
//! - Interest rate shock: -effective_duration × rate_shock
//! - Inflation spike: `real_return_impact`
//! - Currency devaluation: `currency_shock` × foreign-currency exposure
//! - Liquidity crisis: `liquidity_impact`
//! - Custom: caller-supplied `shock`
//!
//! Recovery estimates default to a fixed heuristic. The formulas are an
//! auditable convention, not a statistical model; the Monte Carlo model is
//! available for a path-simulated estimate with the same output fields.

use crate::config::StressConfig;
use crate::error::{Result, RiskError};
use crate::holdings::{total_value, HoldingWeight};
use crate::metrics::{names, MetricValue, RiskMetricSet, UndefinedReason};
use crate::var::parametric_var;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shortest recovery estimate in days
pub const MIN_RECOVERY_DAYS: f64 = 30.0;

/// Longest recovery estimate in days (three years)
pub const MAX_RECOVERY_DAYS: f64 = 1095.0;

/// Recovery days per percentage point of loss, before the multiplier
pub const RECOVERY_DAYS_PER_PCT: f64 = 10.0;

pub const MIN_RECOVERY_PROBABILITY: f64 = 0.30;
pub const MAX_RECOVERY_PROBABILITY: f64 = 0.95;

/// Multipliers above this reduce the recovery probability
pub const HIGH_VOLATILITY_MULTIPLIER: f64 = 2.0;

/// Probability factor applied above `HIGH_VOLATILITY_MULTIPLIER`
pub const HIGH_VOLATILITY_PENALTY: f64 = 0.8;

/// Confidence levels of the stressed parametric VaR
pub const STRESSED_VAR_CONFIDENCE: [f64; 2] = [0.95, 0.99];

/// Recovery estimation model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RecoveryModel {
    /// Fixed clamp formulas on impact and volatility multiplier
    #[default]
    Heuristic,

    /// Seeded geometric Brownian motion paths from the stressed level back
    /// to the pre-shock value
    MonteCarlo { paths: usize, seed: u64 },
}

/// Scenario category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCategory {
    MarketCrash,
    InterestRateShock,
    InflationSpike,
    CurrencyDevaluation,
    LiquidityCrisis,
    Custom,
}

/// Category-specific shock parameters (fractions, e.g. -0.30 for -30%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ScenarioShock {
    MarketCrash {
        market_shock: f64,
    },
    InterestRateShock {
        /// Change in rates (0.02 = +200bp)
        rate_shock: f64,
        /// Portfolio effective duration in years
        effective_duration: f64,
    },
    InflationSpike {
        /// Change in inflation (0.03 = +300bp), informational
        inflation_shock: f64,
        real_return_impact: f64,
    },
    CurrencyDevaluation {
        currency_shock: f64,
    },
    LiquidityCrisis {
        liquidity_impact: f64,
    },
    Custom {
        shock: f64,
    },
}

impl ScenarioShock {
    pub fn category(&self) -> ScenarioCategory {
        match self {
            ScenarioShock::MarketCrash { .. } => ScenarioCategory::MarketCrash,
            ScenarioShock::InterestRateShock { .. } => ScenarioCategory::InterestRateShock,
            ScenarioShock::InflationSpike { .. } => ScenarioCategory::InflationSpike,
            ScenarioShock::CurrencyDevaluation { .. } => ScenarioCategory::CurrencyDevaluation,
            ScenarioShock::LiquidityCrisis { .. } => ScenarioCategory::LiquidityCrisis,
            ScenarioShock::Custom { .. } => ScenarioCategory::Custom,
        }
    }

    /// Shock to a holding's value before currency exposure scaling
    fn base_impact(&self) -> f64 {
        match *self {
            ScenarioShock::MarketCrash { market_shock } => market_shock,
            ScenarioShock::InterestRateShock {
                rate_shock,
                effective_duration,
            } => -effective_duration * rate_shock,
            ScenarioShock::InflationSpike {
                real_return_impact, ..
            } => real_return_impact,
            ScenarioShock::CurrencyDevaluation { currency_shock } => currency_shock,
            ScenarioShock::LiquidityCrisis { liquidity_impact } => liquidity_impact,
            ScenarioShock::Custom { shock } => shock,
        }
    }
}

/// Named stress scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub shock: ScenarioShock,

    /// Factor applied to baseline volatility under stress
    pub volatility_multiplier: f64,

    /// Per-holding shocks replacing the category shock
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sensitivity_overrides: BTreeMap<String, f64>,
}

impl StressScenario {
    pub fn new(name: impl Into<String>, shock: ScenarioShock, volatility_multiplier: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            shock,
            volatility_multiplier,
            sensitivity_overrides: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the shock for one holding
    pub fn with_override(mut self, instrument_id: impl Into<String>, shock: f64) -> Self {
        self.sensitivity_overrides.insert(instrument_id.into(), shock);
        self
    }

    pub fn category(&self) -> ScenarioCategory {
        self.shock.category()
    }

    /// The five default scenarios
    pub fn standard_set() -> Vec<StressScenario> {
        vec![
            StressScenario::new(
                "Market Crash",
                ScenarioShock::MarketCrash { market_shock: -0.30 },
                2.5,
            )
            .with_description("Broad equity sell-off of 30%"),
            StressScenario::new(
                "Interest Rate Shock",
                ScenarioShock::InterestRateShock {
                    rate_shock: 0.02,
                    effective_duration: 7.5,
                },
                1.8,
            )
            .with_description("Rates rise by 200 basis points"),
            StressScenario::new(
                "Inflation Spike",
                ScenarioShock::InflationSpike {
                    inflation_shock: 0.03,
                    real_return_impact: -0.20,
                },
                1.6,
            )
            .with_description("Inflation rises by 300 basis points, eroding real returns"),
            StressScenario::new(
                "Currency Devaluation",
                ScenarioShock::CurrencyDevaluation {
                    currency_shock: -0.15,
                },
                1.4,
            )
            .with_description("Home currency loses 15% against foreign holdings"),
            StressScenario::new(
                "Liquidity Crisis",
                ScenarioShock::LiquidityCrisis {
                    liquidity_impact: -0.25,
                },
                3.0,
            )
            .with_description("Market liquidity dries up, forcing discounted exits"),
        ]
    }

    /// Check shock bounds
    ///
    /// Every impact fraction must lie in [-1, 1] and the volatility
    /// multiplier must be finite and positive.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RiskError::invalid_scenario("<unnamed>", "name must not be empty"));
        }
        if !self.volatility_multiplier.is_finite() || self.volatility_multiplier <= 0.0 {
            return Err(RiskError::invalid_scenario(
                &self.name,
                format!(
                    "volatility multiplier must be positive, got {}",
                    self.volatility_multiplier
                ),
            ));
        }

        match self.shock {
            ScenarioShock::InterestRateShock {
                rate_shock,
                effective_duration,
            } => {
                check_finite(&self.name, "rate_shock", rate_shock)?;
                if !effective_duration.is_finite() || effective_duration < 0.0 {
                    return Err(RiskError::invalid_scenario(
                        &self.name,
                        format!("effective_duration must be non-negative, got {}", effective_duration),
                    ));
                }
            }
            ScenarioShock::InflationSpike { inflation_shock, .. } => {
                check_fraction(&self.name, "inflation_shock", inflation_shock)?;
            }
            _ => {}
        }
        check_fraction(&self.name, "impact", self.shock.base_impact())?;

        for (id, &shock) in &self.sensitivity_overrides {
            check_fraction(&self.name, id, shock)?;
        }
        Ok(())
    }
}

fn check_finite(scenario: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RiskError::invalid_scenario(
            scenario,
            format!("{} must be finite", field),
        ))
    }
}

fn check_fraction(scenario: &str, field: &str, value: f64) -> Result<()> {
    check_finite(scenario, field, value)?;
    if !(-1.0..=1.0).contains(&value) {
        return Err(RiskError::invalid_scenario(
            scenario,
            format!("{} must be within [-100%, +100%], got {:.2}%", field, value * 100.0),
        ));
    }
    Ok(())
}

/// Impact on a single holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingImpact {
    pub instrument_id: String,
    pub market_value: f64,

    /// Applied shock fraction
    pub shock: f64,

    pub impact_amount: f64,
}

/// Result of a stress test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResult {
    pub scenario_name: String,
    pub category: ScenarioCategory,

    /// Portfolio impact in percent (-30.0 for a 30% loss)
    pub impact_percent: f64,

    /// Portfolio impact in currency units
    pub impact_amount: f64,

    /// Portfolio value before the shock
    pub portfolio_value: f64,

    pub volatility_multiplier: f64,

    /// Volatility, parametric VaR and max drawdown under stress
    pub stressed_metrics: BTreeMap<String, MetricValue>,

    /// Estimated days to recover the pre-shock value
    pub recovery_days: u32,

    /// Probability of recovering within the estimate, in [0, 1]
    pub recovery_probability: f64,

    pub holding_impacts: Vec<HoldingImpact>,

    /// How the recovery figures were produced
    pub methodology: String,
}

/// Summary over a batch of stress results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestReport {
    pub results: Vec<StressTestResult>,

    /// Scenario with the most negative impact
    pub worst_scenario: String,

    /// Most negative impact amount
    pub max_loss: f64,

    /// Scenario with the most positive impact
    pub best_scenario: String,

    /// Most positive impact amount
    pub max_gain: f64,

    /// Mean impact amount across scenarios
    pub average_impact: f64,

    /// Mean impact percent across scenarios
    pub average_impact_percent: f64,
}

/// Stress testing engine
#[derive(Debug, Clone)]
pub struct StressTestEngine {
    default_foreign_exposure: f64,
    recovery_model: RecoveryModel,
}

impl Default for StressTestEngine {
    fn default() -> Self {
        Self::new(&StressConfig::default())
    }
}

impl StressTestEngine {
    pub fn new(config: &StressConfig) -> Self {
        Self {
            default_foreign_exposure: config.default_foreign_exposure,
            recovery_model: config.recovery_model.clone(),
        }
    }

    /// Apply one scenario to the holdings
    ///
    /// # Errors
    ///
    /// `InvalidScenario` for out-of-bounds shocks, `InvalidInput` when the
    /// holdings have no positive total value.
    pub fn run(
        &self,
        scenario: &StressScenario,
        baseline: &RiskMetricSet,
        holdings: &[HoldingWeight],
    ) -> Result<StressTestResult> {
        scenario.validate()?;

        let portfolio_value = total_value(holdings);
        if !(portfolio_value > 0.0) {
            return Err(RiskError::InvalidInput(
                "stress test needs holdings with positive total value".to_string(),
            ));
        }

        let holding_impacts: Vec<HoldingImpact> = holdings
            .iter()
            .map(|h| {
                let shock = self.holding_shock(scenario, h);
                HoldingImpact {
                    instrument_id: h.instrument_id.clone(),
                    market_value: h.market_value,
                    shock,
                    impact_amount: h.market_value * shock,
                }
            })
            .collect();

        let impact_amount: f64 = holding_impacts.iter().map(|h| h.impact_amount).sum();
        let impact_percent = impact_amount / portfolio_value * 100.0;
        let multiplier = scenario.volatility_multiplier;

        let stressed_metrics = stressed_metrics(baseline, multiplier)?;
        let (recovery_days, recovery_probability, methodology) = match &self.recovery_model {
            RecoveryModel::Heuristic => {
                let (days, probability) = heuristic_recovery(impact_percent, multiplier);
                (days, probability, HEURISTIC_METHODOLOGY.to_string())
            }
            RecoveryModel::MonteCarlo { paths, seed } => {
                let (days, probability) =
                    simulated_recovery(impact_percent, baseline, &stressed_metrics, *paths, *seed)?;
                (
                    days,
                    probability,
                    format!("monte_carlo: {} seeded GBM paths (seed {})", paths, seed),
                )
            }
        };

        tracing::debug!(
            scenario = %scenario.name,
            category = ?scenario.category(),
            impact_percent,
            impact_amount,
            recovery_days,
            recovery_probability,
            "Ran stress scenario"
        );

        Ok(StressTestResult {
            scenario_name: scenario.name.clone(),
            category: scenario.category(),
            impact_percent,
            impact_amount,
            portfolio_value,
            volatility_multiplier: multiplier,
            stressed_metrics,
            recovery_days,
            recovery_probability,
            holding_impacts,
            methodology,
        })
    }

    /// Run several scenarios against the same baseline
    pub fn run_all(
        &self,
        scenarios: &[StressScenario],
        baseline: &RiskMetricSet,
        holdings: &[HoldingWeight],
    ) -> Result<Vec<StressTestResult>> {
        scenarios
            .iter()
            .map(|scenario| self.run(scenario, baseline, holdings))
            .collect()
    }

    /// Summarize a batch of results
    pub fn report(&self, results: &[StressTestResult]) -> Result<StressTestReport> {
        let first = results.first().ok_or_else(|| {
            RiskError::InvalidInput("no stress test results provided".to_string())
        })?;

        // Seed with the first result so all-loss or all-gain batches work
        let mut worst = first;
        let mut best = first;
        for result in results {
            if result.impact_amount < worst.impact_amount {
                worst = result;
            }
            if result.impact_amount > best.impact_amount {
                best = result;
            }
        }

        let n = results.len() as f64;
        Ok(StressTestReport {
            results: results.to_vec(),
            worst_scenario: worst.scenario_name.clone(),
            max_loss: worst.impact_amount,
            best_scenario: best.scenario_name.clone(),
            max_gain: best.impact_amount,
            average_impact: results.iter().map(|r| r.impact_amount).sum::<f64>() / n,
            average_impact_percent: results.iter().map(|r| r.impact_percent).sum::<f64>() / n,
        })
    }

    fn holding_shock(&self, scenario: &StressScenario, holding: &HoldingWeight) -> f64 {
        if let Some(&shock) = scenario.sensitivity_overrides.get(&holding.instrument_id) {
            return shock;
        }
        let base = scenario.shock.base_impact();
        match scenario.shock {
            ScenarioShock::CurrencyDevaluation { .. } => {
                let exposure = match holding.foreign_currency {
                    Some(true) => 1.0,
                    Some(false) => 0.0,
                    None => self.default_foreign_exposure,
                };
                base * exposure
            }
            _ => base,
        }
    }
}

const HEURISTIC_METHODOLOGY: &str = "heuristic: recovery_days = clamp(30, 1095, |impact%| x 10 x multiplier), \
recovery_probability = clamp(0.30, 0.95, (1 - |impact%|/100) x (0.8 if multiplier > 2 else 1.0)); \
a fixed convention, not a statistical estimate";

/// Heuristic recovery estimate: (days, probability)
///
/// Days are rounded to the nearest whole day.
pub fn heuristic_recovery(impact_percent: f64, volatility_multiplier: f64) -> (u32, f64) {
    let magnitude = impact_percent.abs();

    let days = (magnitude * RECOVERY_DAYS_PER_PCT * volatility_multiplier)
        .clamp(MIN_RECOVERY_DAYS, MAX_RECOVERY_DAYS)
        .round() as u32;

    let penalty = if volatility_multiplier > HIGH_VOLATILITY_MULTIPLIER {
        HIGH_VOLATILITY_PENALTY
    } else {
        1.0
    };
    let probability = ((1.0 - magnitude / 100.0) * penalty)
        .clamp(MIN_RECOVERY_PROBABILITY, MAX_RECOVERY_PROBABILITY);

    (days, probability)
}

fn stressed_metrics(
    baseline: &RiskMetricSet,
    multiplier: f64,
) -> Result<BTreeMap<String, MetricValue>> {
    let mut stressed = BTreeMap::new();
    let periods_per_year = baseline.parameters().periods_per_year;

    match baseline.value(names::VOLATILITY) {
        Some(volatility) => {
            let stressed_vol = volatility * multiplier;
            stressed.insert(names::VOLATILITY.to_string(), MetricValue::Defined(stressed_vol));

            let period_vol = stressed_vol / periods_per_year.sqrt();
            for c in STRESSED_VAR_CONFIDENCE {
                let var = parametric_var(period_vol, c, 1)?;
                stressed.insert(names::parametric_var(c, 1), MetricValue::Defined(var.value));
            }
        }
        None => {
            let missing = MetricValue::Undefined(UndefinedReason::InsufficientObservations);
            stressed.insert(names::VOLATILITY.to_string(), missing);
            for c in STRESSED_VAR_CONFIDENCE {
                stressed.insert(names::parametric_var(c, 1), missing);
            }
        }
    }

    let drawdown = match baseline.value(names::MAX_DRAWDOWN) {
        Some(dd) => MetricValue::Defined((dd * multiplier).max(-1.0)),
        None => MetricValue::Undefined(UndefinedReason::InsufficientObservations),
    };
    stressed.insert(names::MAX_DRAWDOWN.to_string(), drawdown);

    Ok(stressed)
}

/// Path-simulated recovery estimate: (median days among recovered paths,
/// share of paths recovering within the maximum horizon)
fn simulated_recovery(
    impact_percent: f64,
    baseline: &RiskMetricSet,
    stressed: &BTreeMap<String, MetricValue>,
    paths: usize,
    seed: u64,
) -> Result<(u32, f64)> {
    if paths == 0 {
        return Err(RiskError::Config(
            "monte carlo recovery needs at least one path".to_string(),
        ));
    }

    let level = 1.0 + impact_percent / 100.0;
    if impact_percent >= 0.0 {
        return Ok((0, 1.0));
    }
    if level <= 0.0 {
        return Ok((MAX_RECOVERY_DAYS as u32, 0.0));
    }

    let periods_per_year = baseline.parameters().periods_per_year;
    let drift = baseline.value(names::ANNUALIZED_RETURN).unwrap_or(0.0) / periods_per_year;
    let sigma = stressed
        .get(names::VOLATILITY)
        .and_then(MetricValue::value)
        .unwrap_or(0.0)
        / periods_per_year.sqrt();

    let normal = Normal::new(drift - 0.5 * sigma * sigma, sigma)
        .map_err(|e| RiskError::InvalidInput(e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let horizon = MAX_RECOVERY_DAYS as u32;

    let mut recovery_times: Vec<u32> = Vec::new();
    for _ in 0..paths {
        let mut log_level = level.ln();
        for day in 1..=horizon {
            log_level += normal.sample(&mut rng);
            if log_level >= 0.0 {
                recovery_times.push(day);
                break;
            }
        }
    }

    let probability = recovery_times.len() as f64 / paths as f64;
    let days = if recovery_times.is_empty() {
        horizon
    } else {
        recovery_times.sort_unstable();
        recovery_times[recovery_times.len() / 2]
    };

    Ok((days, probability))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RiskMetricsEngine;
    use crate::series::ReturnSeries;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn baseline() -> RiskMetricSet {
        let returns = [
            0.01, -0.02, 0.015, -0.01, 0.02, 0.005, -0.015, 0.01, 0.0, -0.005,
            0.012, -0.008, 0.02, -0.025, 0.01, 0.003, -0.004, 0.018, -0.012, 0.007,
        ];
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        RiskMetricsEngine::default()
            .compute(&ReturnSeries::daily("portfolio", start, &returns), None, &[0.95], &[1])
            .unwrap()
    }

    fn portfolio(value: f64) -> Vec<HoldingWeight> {
        vec![HoldingWeight::new("PORTFOLIO", value, 1.0)]
    }

    #[test]
    fn test_market_crash_example() {
        let scenario = StressScenario::new(
            "Market Crash",
            ScenarioShock::MarketCrash { market_shock: -0.30 },
            2.5,
        );
        let result = StressTestEngine::default()
            .run(&scenario, &baseline(), &portfolio(500_000.0))
            .unwrap();

        assert_relative_eq!(result.impact_amount, -150_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.impact_percent, -30.0, epsilon = 1e-9);
        assert_eq!(result.recovery_days, 750);
        assert_relative_eq!(result.recovery_probability, 0.56, epsilon = 1e-9);
        assert_eq!(result.category, ScenarioCategory::MarketCrash);
        assert!(result.methodology.starts_with("heuristic"));
    }

    #[test]
    fn test_stressed_metrics() {
        let base = baseline();
        let scenario = StressScenario::new(
            "Liquidity",
            ScenarioShock::LiquidityCrisis { liquidity_impact: -0.25 },
            3.0,
        );
        let result = StressTestEngine::default()
            .run(&scenario, &base, &portfolio(100.0))
            .unwrap();

        let vol = base.value(names::VOLATILITY).unwrap();
        let stressed_vol = result.stressed_metrics[names::VOLATILITY].value().unwrap();
        assert_relative_eq!(stressed_vol, vol * 3.0, epsilon = 1e-12);

        let var95 = result.stressed_metrics["parametric_var_95_1d"].value().unwrap();
        let var99 = result.stressed_metrics["parametric_var_99_1d"].value().unwrap();
        assert!(var99 < var95 && var95 < 0.0);

        let dd = base.value(names::MAX_DRAWDOWN).unwrap();
        let stressed_dd = result.stressed_metrics[names::MAX_DRAWDOWN].value().unwrap();
        assert_relative_eq!(stressed_dd, (dd * 3.0).max(-1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_interest_rate_shock_uses_duration() {
        let scenario = StressScenario::standard_set()
            .into_iter()
            .find(|s| s.category() == ScenarioCategory::InterestRateShock)
            .unwrap();
        let result = StressTestEngine::default()
            .run(&scenario, &baseline(), &portfolio(1_000.0))
            .unwrap();

        // -7.5 × 0.02
        assert_relative_eq!(result.impact_percent, -15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_currency_devaluation_scales_by_exposure() {
        let mut holdings = vec![
            HoldingWeight::new("US_FUND", 400.0, 0.4),
            HoldingWeight::new("LOCAL", 400.0, 0.4),
            HoldingWeight::new("UNKNOWN", 200.0, 0.2),
        ];
        holdings[0].foreign_currency = Some(true);
        holdings[1].foreign_currency = Some(false);

        let scenario = StressScenario::new(
            "Devaluation",
            ScenarioShock::CurrencyDevaluation { currency_shock: -0.15 },
            1.4,
        );
        let result = StressTestEngine::default()
            .run(&scenario, &baseline(), &holdings)
            .unwrap();

        // Exposure = 0.4 × 1 + 0.4 × 0 + 0.2 × 0.5 = 0.5
        assert_relative_eq!(result.impact_percent, -7.5, epsilon = 1e-9);
        assert_relative_eq!(result.holding_impacts[1].impact_amount, 0.0);
    }

    #[test]
    fn test_currency_devaluation_unknown_exposure_defaults_to_half() {
        let scenario = StressScenario::new(
            "Devaluation",
            ScenarioShock::CurrencyDevaluation { currency_shock: -0.20 },
            1.0,
        );
        let result = StressTestEngine::default()
            .run(&scenario, &baseline(), &portfolio(1_000.0))
            .unwrap();
        assert_relative_eq!(result.impact_percent, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sensitivity_overrides_replace_shock() {
        let holdings = vec![
            HoldingWeight::new("BANK", 500.0, 0.5),
            HoldingWeight::new("GOLD", 500.0, 0.5),
        ];
        let scenario = StressScenario::new(
            "Crash",
            ScenarioShock::MarketCrash { market_shock: -0.30 },
            2.0,
        )
        .with_override("GOLD", 0.10);

        let result = StressTestEngine::default()
            .run(&scenario, &baseline(), &holdings)
            .unwrap();

        assert_relative_eq!(result.impact_amount, -150.0 + 50.0, epsilon = 1e-9);
        assert_eq!(result.holding_impacts[1].shock, 0.10);
    }

    #[test]
    fn test_invalid_scenarios_rejected() {
        let engine = StressTestEngine::default();
        let base = baseline();

        let too_large = StressScenario::new("Wipeout", ScenarioShock::Custom { shock: -1.5 }, 1.0);
        assert!(matches!(
            engine.run(&too_large, &base, &portfolio(100.0)),
            Err(RiskError::InvalidScenario { .. })
        ));

        let zero_multiplier = StressScenario::new("Calm", ScenarioShock::Custom { shock: -0.1 }, 0.0);
        assert!(matches!(
            engine.run(&zero_multiplier, &base, &portfolio(100.0)),
            Err(RiskError::InvalidScenario { .. })
        ));

        let bad_override = StressScenario::new("Crash", ScenarioShock::Custom { shock: -0.1 }, 1.0)
            .with_override("X", 2.0);
        assert!(bad_override.validate().is_err());

        let nan_shock = StressScenario::new("NaN", ScenarioShock::Custom { shock: f64::NAN }, 1.0);
        assert!(nan_shock.validate().is_err());
    }

    #[test]
    fn test_recovery_clamps() {
        assert_eq!(heuristic_recovery(-1.0, 1.0), (30, 0.95));
        let (days, probability) = heuristic_recovery(-90.0, 3.0);
        assert_eq!(days, 1095);
        assert_relative_eq!(probability, 0.30);
    }

    #[test]
    fn test_standard_set_is_valid() {
        let scenarios = StressScenario::standard_set();
        assert_eq!(scenarios.len(), 5);
        for s in &scenarios {
            assert!(s.validate().is_ok(), "{} should be valid", s.name);
        }
    }

    #[test]
    fn test_report_worst_and_best() {
        let engine = StressTestEngine::default();
        let results = engine
            .run_all(&StressScenario::standard_set(), &baseline(), &portfolio(1_000.0))
            .unwrap();
        let report = engine.report(&results).unwrap();

        assert_eq!(report.worst_scenario, "Market Crash");
        assert_relative_eq!(report.max_loss, -300.0, epsilon = 1e-9);
        assert_eq!(report.best_scenario, "Currency Devaluation");
        assert_eq!(report.results.len(), 5);

        assert!(engine.report(&[]).is_err());
    }

    #[test]
    fn test_monte_carlo_recovery_is_seeded() {
        let config = StressConfig {
            recovery_model: RecoveryModel::MonteCarlo { paths: 200, seed: 42 },
            ..StressConfig::default()
        };
        let engine = StressTestEngine::new(&config);
        let scenario = StressScenario::standard_set().remove(0);
        let base = baseline();

        let first = engine.run(&scenario, &base, &portfolio(1_000.0)).unwrap();
        let second = engine.run(&scenario, &base, &portfolio(1_000.0)).unwrap();

        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first.recovery_probability));
        assert!(first.recovery_days <= 1095);
        assert!(first.methodology.starts_with("monte_carlo"));
    }

    #[test]
    fn test_scenario_yaml() {
        let yaml = r#"
name: Tech Selloff
description: Growth names reprice
volatility_multiplier: 2.2
shock:
  category: custom
  shock: -0.18
sensitivity_overrides:
  INFY: -0.25
"#;
        let scenario: StressScenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.category(), ScenarioCategory::Custom);
        assert_eq!(scenario.sensitivity_overrides["INFY"], -0.25);
        assert!(scenario.validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_run_is_deterministic(
            shock in -1.0f64..1.0,
            multiplier in 0.1f64..5.0,
            value in 1.0f64..10_000_000.0,
        ) {
            let engine = StressTestEngine::default();
            let base = baseline();
            let scenario = StressScenario::new("Custom", ScenarioShock::Custom { shock }, multiplier);

            let a = engine.run(&scenario, &base, &portfolio(value)).unwrap();
            let b = engine.run(&scenario, &base, &portfolio(value)).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_recovery_probability_monotonic(
            impact_a in 0.0f64..100.0,
            impact_b in 0.0f64..100.0,
            mult_a in 0.1f64..5.0,
            mult_b in 0.1f64..5.0,
        ) {
            let (low_impact, high_impact) = if impact_a <= impact_b { (impact_a, impact_b) } else { (impact_b, impact_a) };
            let (low_mult, high_mult) = if mult_a <= mult_b { (mult_a, mult_b) } else { (mult_b, mult_a) };

            let (_, p_mild) = heuristic_recovery(-low_impact, low_mult);
            let (_, p_severe) = heuristic_recovery(-high_impact, high_mult);
            prop_assert!(p_severe <= p_mild);
            prop_assert!((0.0..=1.0).contains(&p_severe));
        }
    }
}
