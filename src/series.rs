//! Return series construction
//!
//! Turns raw per-instrument price histories into periodic return series that
//! share one calendar: every series is inner-joined on timestamp before any
//! return is computed, so the i-th return of each series covers the same
//! period.

use crate::config::SeriesConfig;
use crate::error::{Result, RiskError};
use crate::holdings::HoldingWeight;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Single price observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }

    /// Non-finite or non-positive prices count as missing observations
    fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Single periodic return, stamped with the end of its period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered periodic returns for one instrument
///
/// Timestamps are strictly increasing. Built once per analysis run and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    instrument_id: String,
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Create a series from explicit points, checking timestamp order
    pub fn new(instrument_id: impl Into<String>, points: Vec<ReturnPoint>) -> Result<Self> {
        let instrument_id = instrument_id.into();
        if let Some(pair) = points.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(RiskError::InvalidInput(format!(
                "{}: return timestamps must be strictly increasing ({} follows {})",
                instrument_id, pair[1].timestamp, pair[0].timestamp
            )));
        }
        Ok(Self {
            instrument_id,
            points,
        })
    }

    /// Create a daily series starting at `start`
    pub fn daily(instrument_id: impl Into<String>, start: DateTime<Utc>, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, &value)| ReturnPoint {
                timestamp: start + Duration::days(i as i64),
                value,
            })
            .collect();
        Self {
            instrument_id: instrument_id.into(),
            points,
        }
    }

    /// Compute returns between consecutive valid prices of a single history
    ///
    /// Missing observations (non-finite or non-positive prices) are skipped,
    /// so a gap produces one return spanning it.
    pub fn from_prices(instrument_id: impl Into<String>, prices: &[PricePoint]) -> Result<Self> {
        let instrument_id = instrument_id.into();
        validate_history(&instrument_id, prices)?;
        let valid: Vec<PricePoint> = prices.iter().copied().filter(PricePoint::is_valid).collect();
        Ok(Self {
            points: returns_from_prices(&valid),
            instrument_id,
        })
    }

    pub fn instrument_id(&self) -> &str {
        &self.instrument_id
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Keep only the most recent `n` returns
    pub fn tail(&self, n: usize) -> Self {
        let start = self.points.len().saturating_sub(n);
        Self {
            instrument_id: self.instrument_id.clone(),
            points: self.points[start..].to_vec(),
        }
    }
}

/// Return series for all holdings (and optionally a benchmark) on one calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedReturns {
    timestamps: Vec<DateTime<Utc>>,
    holdings: BTreeMap<String, ReturnSeries>,
    benchmark: Option<ReturnSeries>,
}

impl AlignedReturns {
    /// Shared return timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Number of aligned returns per series
    pub fn observations(&self) -> usize {
        self.timestamps.len()
    }

    pub fn holding(&self, instrument_id: &str) -> Option<&ReturnSeries> {
        self.holdings.get(instrument_id)
    }

    /// Holding series ordered by instrument id
    pub fn holdings(&self) -> impl Iterator<Item = &ReturnSeries> {
        self.holdings.values()
    }

    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    pub fn benchmark(&self) -> Option<&ReturnSeries> {
        self.benchmark.as_ref()
    }

    /// Blend holding returns into the weighted portfolio return series
    pub fn portfolio_returns(&self, weights: &[HoldingWeight]) -> Result<ReturnSeries> {
        let mut blended = vec![0.0; self.timestamps.len()];
        for weight in weights {
            let series = self.holdings.get(&weight.instrument_id).ok_or_else(|| {
                RiskError::InvalidInput(format!(
                    "no aligned return series for holding {}",
                    weight.instrument_id
                ))
            })?;
            for (acc, point) in blended.iter_mut().zip(series.points()) {
                *acc += weight.weight * point.value;
            }
        }

        let points = self
            .timestamps
            .iter()
            .zip(blended)
            .map(|(&timestamp, value)| ReturnPoint { timestamp, value })
            .collect();

        Ok(ReturnSeries {
            instrument_id: "portfolio".to_string(),
            points,
        })
    }
}

/// Builds aligned return series from raw price histories
#[derive(Debug, Clone)]
pub struct ReturnSeriesBuilder {
    lookback_periods: usize,
    min_observations: usize,
}

impl Default for ReturnSeriesBuilder {
    fn default() -> Self {
        Self::new(&SeriesConfig::default())
    }
}

impl ReturnSeriesBuilder {
    pub fn new(config: &SeriesConfig) -> Self {
        Self {
            lookback_periods: config.lookback_periods,
            min_observations: config.min_observations,
        }
    }

    /// Align holding histories (and an optional benchmark) and compute returns
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty or unsorted history
    /// - `MisalignedCalendar` when the histories share no timestamp
    /// - `InsufficientData` when a series ends up with fewer than
    ///   `min_observations` aligned returns
    pub fn build(
        &self,
        histories: &BTreeMap<String, Vec<PricePoint>>,
        benchmark: Option<(&str, &[PricePoint])>,
    ) -> Result<AlignedReturns> {
        if histories.is_empty() {
            return Err(RiskError::InvalidInput(
                "no price histories supplied".to_string(),
            ));
        }

        let mut indexed: Vec<(&str, BTreeMap<DateTime<Utc>, f64>)> = Vec::new();
        for (id, prices) in histories {
            indexed.push((id.as_str(), index_valid_prices(id, prices)?));
        }
        let benchmark_index = match benchmark {
            Some((id, prices)) => Some((id, index_valid_prices(id, prices)?)),
            None => None,
        };

        let mut common: BTreeSet<DateTime<Utc>> = indexed[0].1.keys().copied().collect();
        for (_, index) in indexed.iter().skip(1).chain(benchmark_index.iter()) {
            common.retain(|ts| index.contains_key(ts));
        }

        if common.is_empty() {
            return Err(RiskError::MisalignedCalendar(format!(
                "no common timestamps across {} series",
                indexed.len() + usize::from(benchmark_index.is_some())
            )));
        }

        let grid: Vec<DateTime<Utc>> = common.into_iter().collect();
        tracing::debug!(
            series = indexed.len(),
            common_timestamps = grid.len(),
            "Aligned price histories"
        );

        let mut holdings = BTreeMap::new();
        for (id, index) in &indexed {
            let series = self.aligned_series(id, index, &grid)?;
            holdings.insert(id.to_string(), series);
        }
        let benchmark = match &benchmark_index {
            Some((id, index)) => Some(self.aligned_series(id, index, &grid)?),
            None => None,
        };

        let timestamps = holdings
            .values()
            .next()
            .map(ReturnSeries::timestamps)
            .unwrap_or_default();

        Ok(AlignedReturns {
            timestamps,
            holdings,
            benchmark,
        })
    }

    fn aligned_series(
        &self,
        id: &str,
        index: &BTreeMap<DateTime<Utc>, f64>,
        grid: &[DateTime<Utc>],
    ) -> Result<ReturnSeries> {
        let prices: Vec<PricePoint> = grid
            .iter()
            .filter_map(|ts| index.get(ts).map(|&price| PricePoint::new(*ts, price)))
            .collect();

        let series = ReturnSeries {
            instrument_id: id.to_string(),
            points: returns_from_prices(&prices),
        }
        .tail(self.lookback_periods);

        if series.len() < self.min_observations {
            return Err(RiskError::insufficient(
                id,
                self.min_observations,
                series.len(),
            ));
        }
        Ok(series)
    }
}

fn validate_history(id: &str, prices: &[PricePoint]) -> Result<()> {
    if prices.is_empty() {
        return Err(RiskError::InvalidInput(format!("{}: empty price history", id)));
    }
    if let Some(pair) = prices.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        return Err(RiskError::InvalidInput(format!(
            "{}: price timestamps must be sorted ascending without duplicates ({} follows {})",
            id, pair[1].timestamp, pair[0].timestamp
        )));
    }
    Ok(())
}

fn index_valid_prices(id: &str, prices: &[PricePoint]) -> Result<BTreeMap<DateTime<Utc>, f64>> {
    validate_history(id, prices)?;

    let index: BTreeMap<DateTime<Utc>, f64> = prices
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| (p.timestamp, p.price))
        .collect();

    let skipped = prices.len() - index.len();
    if skipped > 0 {
        tracing::warn!(instrument = %id, skipped, "Skipping missing price observations");
    }
    if index.len() < 2 {
        return Err(RiskError::insufficient(id, 2, index.len()));
    }
    Ok(index)
}

fn returns_from_prices(prices: &[PricePoint]) -> Vec<ReturnPoint> {
    prices
        .windows(2)
        .map(|w| ReturnPoint {
            timestamp: w[1].timestamp,
            value: w[1].price / w[0].price - 1.0,
        })
        .collect()
}
