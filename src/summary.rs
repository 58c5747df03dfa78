//! Backtest aggregation: exceedance counting, stability label, and
//! descriptive loss statistics.

use serde::{Deserialize, Serialize};

use crate::backtest::BacktestRecord;
use crate::config::Methodology;

/// Two-valued model-quality classification
///
/// `Stable` when exceedances stay at or below the configured threshold over
/// the test horizon, `Weak` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Weak,
}

/// Exceedance-based summary over an ordered record sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// Methodology the exceedances were scored against
    pub methodology: Methodology,

    /// Days where the realized loss exceeded that methodology's VaR
    pub exceedance_count: usize,

    /// Days that carried a VaR estimate for the scored methodology
    pub scored_days: usize,

    /// Stability classification at the configured threshold
    pub stability: Stability,
}

impl BacktestSummary {
    /// Score `records` against one methodology's VaR line.
    ///
    /// Days without an estimate for that methodology (inactive or failed)
    /// are excluded from both counts.
    pub fn from_records(
        records: &[BacktestRecord],
        methodology: Methodology,
        stability_threshold: usize,
    ) -> Self {
        let mut exceedance_count = 0;
        let mut scored_days = 0;
        for record in records {
            if let Some(var) = record.value_at_risk(methodology) {
                scored_days += 1;
                if record.actual_loss > var {
                    exceedance_count += 1;
                }
            }
        }

        let stability = if exceedance_count <= stability_threshold {
            Stability::Stable
        } else {
            Stability::Weak
        };

        Self {
            methodology,
            exceedance_count,
            scored_days,
            stability,
        }
    }
}

/// Descriptive statistics of realized losses over the test horizon
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LossStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl LossStatistics {
    pub fn from_records(records: &[BacktestRecord]) -> Self {
        if records.is_empty() {
            return Self {
                min: 0.0,
                max: 0.0,
                mean: 0.0,
                std_dev: 0.0,
            };
        }

        let n = records.len() as f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for record in records {
            min = min.min(record.actual_loss);
            max = max.max(record.actual_loss);
            sum += record.actual_loss;
        }
        let mean = sum / n;

        let std_dev = if records.len() < 2 {
            0.0
        } else {
            let variance = records
                .iter()
                .map(|r| (r.actual_loss - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            variance.sqrt()
        };

        Self {
            min,
            max,
            mean,
            std_dev,
        }
    }
}
