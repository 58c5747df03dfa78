//! Error types for risk estimation and backtesting

use thiserror::Error;

/// Errors that can occur while building a return series or running a backtest
///
/// Fatal errors (`InsufficientHistory`, `InvalidConfiguration`,
/// `NonPositivePrice`) abort the whole run. `ModelFit` and `TailEstimation`
/// are recoverable at the per-day level: the walk-forward engine captures
/// them in that day's record and continues.
#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Insufficient history: need at least {required} returns, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("Tail estimation failed: {0}")]
    TailEstimation(String),

    #[error("Non-positive close {price} at row {index}")]
    NonPositivePrice { index: usize, price: f64 },
}

pub type Result<T> = std::result::Result<T, RiskError>;
