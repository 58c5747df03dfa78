//! # riskbench: Walk-forward VaR and Expected Shortfall backtesting
//!
//! This library computes forward-looking market-risk estimates for a daily
//! return series — Value-at-Risk at 99% and Expected Shortfall at 97.5% —
//! and scores them with a walk-forward (rolling-window) backtest: for each
//! day of the test horizon it re-estimates risk from preceding data only,
//! forecasts the next day's loss threshold, and compares it to the realized
//! outcome.
//!
//! ## Core Components
//!
//! - **Return transformer**: dated closes to an immutable log-return series
//! - **Risk model set**: historical/empirical VaR, parametric-normal VaR,
//!   and a GARCH(1,1) conditional-volatility model with Student-t
//!   innovations fitted by maximum likelihood
//! - **Tail-risk estimator**: Expected Shortfall via historical tail
//!   averaging or simulation from the fitted conditional distribution
//! - **Walk-forward backtester**: one record per test day, date ascending,
//!   per-day refits running in parallel
//! - **Summary**: exceedance count, STABLE/WEAK classification, and
//!   descriptive loss statistics
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use riskbench::{run_backtest, BacktestConfig, Methodology, PricePoint, ShortfallMethod};
//!
//! let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
//! let prices: Vec<PricePoint> = (0..101i64)
//!     .map(|i| PricePoint {
//!         date: start + chrono::Duration::days(i),
//!         close: 100.0 * (1.0 + 0.002 * (i as f64 * 0.7).sin()),
//!     })
//!     .collect();
//!
//! let config = BacktestConfig {
//!     training_window: 60,
//!     test_horizon: 20,
//!     methodology: Methodology::Historical,
//!     shortfall: ShortfallMethod::HistoricalTail,
//!     ..BacktestConfig::default()
//! };
//!
//! let report = run_backtest(&prices, &config).unwrap();
//! assert_eq!(report.records.len(), 20);
//! assert!(report.records.iter().all(|r| r.historical_var.is_some()));
//! ```
//!
//! The engine performs no I/O: price history comes from the caller as a
//! single batch and the [`BacktestReport`] is the only retained output.

mod backtest;
mod config;
mod error;
mod models;
mod series;
mod shortfall;
mod summary;

pub use backtest::{run_backtest, BacktestEngine, BacktestRecord, BacktestReport};
pub use config::{
    BacktestConfig, Methodology, NuBound, ShortfallMethod, DEFAULT_STABILITY_THRESHOLD,
    ES_CONFIDENCE, LEGACY_ES_FLOOR_RATIO, NU_CAP_FAT_TAILS, NU_FLOOR_FINITE_VARIANCE,
    VAR_CONFIDENCE,
};
pub use error::{Result, RiskError};
pub use models::{historical_var, parametric_var, GarchStudentT};
pub use series::{PricePoint, ReturnSeries};
pub use shortfall::{historical_expected_shortfall, simulated_expected_shortfall};
pub use summary::{BacktestSummary, LossStatistics, Stability};
