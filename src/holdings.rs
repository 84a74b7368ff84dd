//! Holdings and portfolio weights
//!
//! Weights are always derived here from quantities and prices (or market
//! values) rather than accepted from the caller, so they sum to one.

use crate::error::{Result, RiskError};
use serde::{Deserialize, Serialize};

/// How a holding's current market value is expressed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valuation {
    /// Current price per unit; value = quantity × price
    Price(f64),
    /// Current market value of the whole position
    Value(f64),
}

/// Position as supplied by the holdings collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Instrument identifier (e.g., "INFY")
    pub instrument_id: String,

    /// Units held (must not be negative)
    pub quantity: f64,

    /// Current valuation
    pub valuation: Valuation,

    /// Whether the instrument is denominated in a foreign currency
    /// (None = unknown)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_currency: Option<bool>,
}

impl Holding {
    pub fn with_price(instrument_id: impl Into<String>, quantity: f64, price: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            quantity,
            valuation: Valuation::Price(price),
            foreign_currency: None,
        }
    }

    pub fn with_value(instrument_id: impl Into<String>, value: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            quantity: 1.0,
            valuation: Valuation::Value(value),
            foreign_currency: None,
        }
    }

    /// Mark the currency denomination of this holding
    pub fn foreign(mut self, foreign: bool) -> Self {
        self.foreign_currency = Some(foreign);
        self
    }

    /// Current market value of the position
    pub fn market_value(&self) -> Result<f64> {
        if !self.quantity.is_finite() || self.quantity < 0.0 {
            return Err(RiskError::InvalidInput(format!(
                "{}: quantity must be a non-negative number, got {}",
                self.instrument_id, self.quantity
            )));
        }

        let value = match self.valuation {
            Valuation::Price(price) => {
                if !price.is_finite() || price < 0.0 {
                    return Err(RiskError::InvalidInput(format!(
                        "{}: price must be a non-negative number, got {}",
                        self.instrument_id, price
                    )));
                }
                self.quantity * price
            }
            Valuation::Value(value) => {
                if !value.is_finite() || value < 0.0 {
                    return Err(RiskError::InvalidInput(format!(
                        "{}: market value must be a non-negative number, got {}",
                        self.instrument_id, value
                    )));
                }
                value
            }
        };
        Ok(value)
    }
}

/// Holding's share of the total portfolio value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingWeight {
    pub instrument_id: String,

    /// Current market value
    pub market_value: f64,

    /// market_value / total portfolio value
    pub weight: f64,

    /// Currency denomination, carried over from the holding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_currency: Option<bool>,
}

impl HoldingWeight {
    pub fn new(instrument_id: impl Into<String>, market_value: f64, weight: f64) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            market_value,
            weight,
            foreign_currency: None,
        }
    }

    /// Derive weights for a set of holdings
    ///
    /// Holdings sharing an instrument id are merged into one position.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for negative or non-finite quantities/prices, or when
    /// the portfolio has no positive total value.
    pub fn from_holdings(holdings: &[Holding]) -> Result<Vec<HoldingWeight>> {
        let mut merged: Vec<HoldingWeight> = Vec::with_capacity(holdings.len());
        for holding in holdings {
            let value = holding.market_value()?;
            match merged
                .iter_mut()
                .find(|w| w.instrument_id == holding.instrument_id)
            {
                Some(existing) => {
                    existing.market_value += value;
                    existing.foreign_currency =
                        existing.foreign_currency.or(holding.foreign_currency);
                }
                None => merged.push(HoldingWeight {
                    instrument_id: holding.instrument_id.clone(),
                    market_value: value,
                    weight: 0.0,
                    foreign_currency: holding.foreign_currency,
                }),
            }
        }

        let total = total_value(&merged);
        if !(total > 0.0) {
            return Err(RiskError::InvalidInput(
                "portfolio total value must be positive".to_string(),
            ));
        }

        for w in &mut merged {
            w.weight = w.market_value / total;
        }
        Ok(merged)
    }
}

/// Sum of market values
pub fn total_value(weights: &[HoldingWeight]) -> f64 {
    weights.iter().map(|w| w.market_value).sum()
}
