//! Price-to-return transformation
//!
//! The data provider delivers a batch of dated daily closes; the engine
//! consumes log returns. `ReturnSeries` is built once per query and is
//! immutable afterwards: training windows are borrowed slices of it,
//! re-sliced at each walk-forward step and never mutated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// One row from the price provider: a dated daily close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Chronologically ordered log-return series
///
/// Insertion order is chronological order. Fields are private so the series
/// cannot be mutated once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    /// Build a return series from consecutive daily closes
    ///
    /// Each value is `ln(close_t / close_{t-1})`; the first close has no
    /// predecessor and is dropped. An empty input signals
    /// `InsufficientHistory`; a non-positive close violates the provider
    /// contract and signals `NonPositivePrice`.
    pub fn from_prices(prices: &[PricePoint]) -> Result<Self> {
        if prices.is_empty() {
            return Err(RiskError::InsufficientHistory {
                required: 2,
                available: 0,
            });
        }

        for (index, point) in prices.iter().enumerate() {
            if !(point.close > 0.0) || !point.close.is_finite() {
                return Err(RiskError::NonPositivePrice {
                    index,
                    price: point.close,
                });
            }
        }

        let mut dates = Vec::with_capacity(prices.len().saturating_sub(1));
        let mut values = Vec::with_capacity(prices.len().saturating_sub(1));
        for pair in prices.windows(2) {
            dates.push(pair[1].date);
            values.push((pair[1].close / pair[0].close).ln());
        }

        Ok(Self { dates, values })
    }

    /// Number of returns in the series
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Log returns in chronological order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Return dates, parallel to [`values`](Self::values)
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }
}
