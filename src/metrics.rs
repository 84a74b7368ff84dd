//! Portfolio risk metrics
//!
//! Computes the full metric set for one return series:
//! - Volatility: sample standard deviation, annualized
//! - Historical VaR, parametric VaR and CVaR per confidence level and horizon
//! - Sharpe Ratio: (Annualized Return - Risk-Free Rate) / Volatility
//! - Sortino Ratio: same numerator over downside deviation
//! - Calmar Ratio: Annualized Return / |Maximum Drawdown|
//! - Maximum Drawdown and its peak-to-trough duration
//! - Beta, Alpha, tracking error and the systematic/idiosyncratic split
//!   against a benchmark
//!
//! Degenerate inputs produce [`MetricValue::Undefined`] rather than an error
//! or a fabricated zero.

use crate::config::MetricsConfig;
use crate::error::{Result, RiskError};
use crate::series::ReturnSeries;
use crate::var::{metric_suffix, parametric_var, VarEngine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Values at or below this are treated as zero when used as a divisor
const ZERO_TOLERANCE: f64 = 1e-12;

/// Metric names used in [`RiskMetricSet`]
pub mod names {
    pub const VOLATILITY: &str = "volatility";
    pub const ANNUALIZED_RETURN: &str = "annualized_return";
    pub const SHARPE_RATIO: &str = "sharpe_ratio";
    pub const SORTINO_RATIO: &str = "sortino_ratio";
    pub const CALMAR_RATIO: &str = "calmar_ratio";
    pub const MAX_DRAWDOWN: &str = "max_drawdown";
    pub const MAX_DRAWDOWN_DURATION: &str = "max_drawdown_duration";
    pub const DOWNSIDE_DEVIATION: &str = "downside_deviation";
    pub const BETA: &str = "beta";
    pub const ALPHA: &str = "alpha";
    pub const TRACKING_ERROR: &str = "tracking_error";
    pub const SYSTEMATIC_RISK: &str = "systematic_risk";
    pub const IDIOSYNCRATIC_RISK: &str = "idiosyncratic_risk";
    pub const BENCHMARK_ANNUALIZED_RETURN: &str = "benchmark_annualized_return";

    /// Historical VaR name, e.g. `var_95_1d`
    pub fn var(confidence_level: f64, horizon_days: u32) -> String {
        format!("var_{}", super::metric_suffix(confidence_level, horizon_days))
    }

    /// CVaR name, e.g. `cvar_99_1d`
    pub fn cvar(confidence_level: f64, horizon_days: u32) -> String {
        format!("cvar_{}", super::metric_suffix(confidence_level, horizon_days))
    }

    /// Parametric VaR name, e.g. `parametric_var_95_10d`
    pub fn parametric_var(confidence_level: f64, horizon_days: u32) -> String {
        format!(
            "parametric_var_{}",
            super::metric_suffix(confidence_level, horizon_days)
        )
    }
}

/// Flag set on a metric set computed without a benchmark
pub const BENCHMARK_UNAVAILABLE: &str = "benchmark_unavailable";

/// Why a metric could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedReason {
    ZeroVolatility,
    ZeroDrawdown,
    ZeroDownsideDeviation,
    ZeroBenchmarkVariance,
    InsufficientObservations,
}

/// A metric result that is either a number or explicitly unavailable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl MetricValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Defined(v) => Some(*v),
            MetricValue::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Defined(_))
    }

    /// `numerator / denominator`, or `Undefined(reason)` for a zero denominator
    fn ratio(numerator: f64, denominator: f64, reason: UndefinedReason) -> Self {
        if denominator.abs() <= ZERO_TOLERANCE {
            MetricValue::Undefined(reason)
        } else {
            MetricValue::Defined(numerator / denominator)
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Defined(v) => write!(f, "{:.4}", v),
            MetricValue::Undefined(_) => write!(f, "not available"),
        }
    }
}

/// Parameters a metric set was computed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationParameters {
    pub confidence_levels: Vec<f64>,
    pub horizons_days: Vec<u32>,

    /// Number of returns the metrics were computed over
    pub lookback_periods: usize,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
    pub benchmark_id: Option<String>,
}

/// Named risk metrics for one portfolio at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetricSet {
    metrics: BTreeMap<String, MetricValue>,
    flags: BTreeSet<String>,
    parameters: CalculationParameters,
    computed_at: DateTime<Utc>,
}

impl RiskMetricSet {
    pub fn get(&self, name: &str) -> Option<MetricValue> {
        self.metrics.get(name).copied()
    }

    /// Numeric value of a defined metric
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|m| m.value())
    }

    pub fn metrics(&self) -> &BTreeMap<String, MetricValue> {
        &self.metrics
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }

    pub fn parameters(&self) -> &CalculationParameters {
        &self.parameters
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }
}

/// Calmar ratio from its stored inputs
///
/// Undefined when volatility or the maximum drawdown is zero.
pub fn calmar_ratio(annualized_return: f64, volatility: f64, max_drawdown: f64) -> MetricValue {
    if volatility.abs() <= ZERO_TOLERANCE {
        return MetricValue::Undefined(UndefinedReason::ZeroVolatility);
    }
    MetricValue::ratio(annualized_return, max_drawdown.abs(), UndefinedReason::ZeroDrawdown)
}

/// Deepest drawdown of the cumulative index and its peak-to-trough length
///
/// The index starts at 1.0 before the first return. Returns `(0.0, 0)` for a
/// series that never falls below its running peak.
pub fn max_drawdown(returns: &[f64]) -> (f64, usize) {
    let mut wealth = 1.0;
    let mut peak = 1.0;
    let mut peak_index = 0;
    let mut max_dd = 0.0;
    let mut duration = 0;

    for (i, r) in returns.iter().enumerate() {
        wealth *= 1.0 + r;
        if wealth > peak {
            peak = wealth;
            peak_index = i + 1;
        }

        let drawdown = (wealth - peak) / peak;
        if drawdown < max_dd {
            max_dd = drawdown;
            duration = i + 1 - peak_index;
        }
    }

    (max_dd, duration)
}

/// Risk metric calculator
#[derive(Debug, Clone)]
pub struct RiskMetricsEngine {
    periods_per_year: f64,
    risk_free_rate: f64,
}

impl Default for RiskMetricsEngine {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

impl RiskMetricsEngine {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            periods_per_year: config.periods_per_year,
            risk_free_rate: config.risk_free_rate,
        }
    }

    /// Compute the metric set for `returns`
    ///
    /// The benchmark, when given, must cover the same periods as `returns`.
    ///
    /// # Errors
    ///
    /// Only structurally invalid input is an error: fewer than two returns,
    /// non-finite values, mismatched benchmark length, a confidence level
    /// outside (0, 1) or a zero horizon.
    pub fn compute(
        &self,
        returns: &ReturnSeries,
        benchmark: Option<&ReturnSeries>,
        confidence_levels: &[f64],
        horizons_days: &[u32],
    ) -> Result<RiskMetricSet> {
        let values = returns.values();
        validate_returns(returns.instrument_id(), &values)?;
        for &c in confidence_levels {
            if c <= 0.0 || c >= 1.0 || c.is_nan() {
                return Err(RiskError::InvalidConfidenceLevel(c));
            }
        }
        if horizons_days.contains(&0) {
            return Err(RiskError::InvalidTimeHorizon(0));
        }

        let mut metrics = BTreeMap::new();
        let mut flags = BTreeSet::new();

        let period_std = sample_variance(&values).sqrt();
        let volatility = period_std * self.periods_per_year.sqrt();
        let annualized_return = mean(&values) * self.periods_per_year;
        let (max_dd, dd_duration) = max_drawdown(&values);

        metrics.insert(names::VOLATILITY.to_string(), MetricValue::Defined(volatility));
        metrics.insert(
            names::ANNUALIZED_RETURN.to_string(),
            MetricValue::Defined(annualized_return),
        );
        metrics.insert(names::MAX_DRAWDOWN.to_string(), MetricValue::Defined(max_dd));
        metrics.insert(
            names::MAX_DRAWDOWN_DURATION.to_string(),
            MetricValue::Defined(dd_duration as f64),
        );

        let excess_return = annualized_return - self.risk_free_rate;
        let sharpe = if volatility <= ZERO_TOLERANCE {
            MetricValue::Undefined(UndefinedReason::ZeroVolatility)
        } else {
            MetricValue::Defined(excess_return / volatility)
        };
        metrics.insert(names::SHARPE_RATIO.to_string(), sharpe);

        let downside = self.downside_deviation(&values);
        let sortino = match downside {
            _ if volatility <= ZERO_TOLERANCE => {
                MetricValue::Undefined(UndefinedReason::ZeroVolatility)
            }
            MetricValue::Defined(dd) => {
                MetricValue::ratio(excess_return, dd, UndefinedReason::ZeroDownsideDeviation)
            }
            undefined => undefined,
        };
        metrics.insert(names::DOWNSIDE_DEVIATION.to_string(), downside);
        metrics.insert(names::SORTINO_RATIO.to_string(), sortino);

        metrics.insert(
            names::CALMAR_RATIO.to_string(),
            calmar_ratio(annualized_return, volatility, max_dd),
        );

        let var_engine = VarEngine::with_historical_returns(&values)?;
        for &c in confidence_levels {
            for &h in horizons_days {
                let var = var_engine.historical_var(c, h)?;
                let cvar = var_engine.cvar(c, h)?;
                let parametric = parametric_var(period_std, c, h)?;
                metrics.insert(names::var(c, h), MetricValue::Defined(var.value));
                metrics.insert(names::cvar(c, h), MetricValue::Defined(cvar.value));
                metrics.insert(
                    names::parametric_var(c, h),
                    MetricValue::Defined(parametric.value),
                );
            }
        }

        match benchmark {
            Some(bench) => {
                let bench_values = bench.values();
                if bench_values.len() != values.len() {
                    return Err(RiskError::InvalidInput(format!(
                        "benchmark {} has {} returns, portfolio has {}",
                        bench.instrument_id(),
                        bench_values.len(),
                        values.len()
                    )));
                }
                validate_returns(bench.instrument_id(), &bench_values)?;
                self.benchmark_metrics(&values, &bench_values, annualized_return, &mut metrics);
            }
            None => {
                flags.insert(BENCHMARK_UNAVAILABLE.to_string());
            }
        }

        tracing::debug!(
            series = %returns.instrument_id(),
            observations = values.len(),
            metrics = metrics.len(),
            benchmark = benchmark.is_some(),
            "Computed risk metrics"
        );

        Ok(RiskMetricSet {
            metrics,
            flags,
            parameters: CalculationParameters {
                confidence_levels: confidence_levels.to_vec(),
                horizons_days: horizons_days.to_vec(),
                lookback_periods: values.len(),
                periods_per_year: self.periods_per_year,
                risk_free_rate: self.risk_free_rate,
                benchmark_id: benchmark.map(|b| b.instrument_id().to_string()),
            },
            computed_at: Utc::now(),
        })
    }

    /// Sample standard deviation of the negative returns, annualized
    fn downside_deviation(&self, returns: &[f64]) -> MetricValue {
        let negatives: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        if negatives.len() < 2 {
            return MetricValue::Undefined(UndefinedReason::InsufficientObservations);
        }

        let deviation = sample_variance(&negatives).sqrt() * self.periods_per_year.sqrt();
        if deviation <= ZERO_TOLERANCE {
            MetricValue::Undefined(UndefinedReason::ZeroDownsideDeviation)
        } else {
            MetricValue::Defined(deviation)
        }
    }

    fn benchmark_metrics(
        &self,
        returns: &[f64],
        benchmark: &[f64],
        annualized_return: f64,
        metrics: &mut BTreeMap<String, MetricValue>,
    ) {
        let benchmark_return = mean(benchmark) * self.periods_per_year;
        let benchmark_variance = sample_variance(benchmark);
        let portfolio_variance = sample_variance(returns);

        let active: Vec<f64> = returns.iter().zip(benchmark).map(|(p, b)| p - b).collect();
        let tracking_error = sample_variance(&active).sqrt() * self.periods_per_year.sqrt();

        metrics.insert(
            names::BENCHMARK_ANNUALIZED_RETURN.to_string(),
            MetricValue::Defined(benchmark_return),
        );
        metrics.insert(
            names::TRACKING_ERROR.to_string(),
            MetricValue::Defined(tracking_error),
        );

        let beta = MetricValue::ratio(
            sample_covariance(returns, benchmark),
            benchmark_variance,
            UndefinedReason::ZeroBenchmarkVariance,
        );
        let alpha = match beta {
            MetricValue::Defined(b) => MetricValue::Defined(annualized_return - b * benchmark_return),
            undefined => undefined,
        };

        let (systematic, idiosyncratic) = match beta {
            MetricValue::Defined(_) if portfolio_variance <= ZERO_TOLERANCE => (
                MetricValue::Undefined(UndefinedReason::ZeroVolatility),
                MetricValue::Undefined(UndefinedReason::ZeroVolatility),
            ),
            MetricValue::Defined(b) => {
                let share = (b * b * benchmark_variance / portfolio_variance).clamp(0.0, 1.0);
                (MetricValue::Defined(share), MetricValue::Defined(1.0 - share))
            }
            undefined => (undefined, undefined),
        };

        metrics.insert(names::BETA.to_string(), beta);
        metrics.insert(names::ALPHA.to_string(), alpha);
        metrics.insert(names::SYSTEMATIC_RISK.to_string(), systematic);
        metrics.insert(names::IDIOSYNCRATIC_RISK.to_string(), idiosyncratic);
    }
}

fn validate_returns(id: &str, values: &[f64]) -> Result<()> {
    if values.len() < 2 {
        return Err(RiskError::insufficient(id, 2, values.len()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(RiskError::InvalidInput(format!(
            "{}: returns must be finite",
            id
        )));
    }
    Ok(())
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator)
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    sample_covariance(values, values)
}

pub(crate) fn sample_covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean_a = mean(&a[..n]);
    let mean_b = mean(&b[..n]);
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64
}
