//! Walk-forward backtesting engine
//!
//! For each day of the test horizon the engine re-estimates risk from the
//! trailing training window only, forecasts the next day's loss quantile,
//! and records it against the realized loss. Each step is a pure function
//! of its window, so the per-day refits fan out across worker threads; the
//! collected records keep the date-ascending contract because they are
//! gathered in index order.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{BacktestConfig, Methodology, ShortfallMethod, ES_CONFIDENCE, VAR_CONFIDENCE};
use crate::error::{Result, RiskError};
use crate::models::{historical_var, parametric_var, GarchStudentT};
use crate::series::{PricePoint, ReturnSeries};
use crate::shortfall::{historical_expected_shortfall, simulated_expected_shortfall};
use crate::summary::{BacktestSummary, LossStatistics};

/// Returns are scaled to percent units for the conditional-volatility fit
/// and rescaled on the way out.
const PERCENT_SCALE: f64 = 100.0;

/// One forecast day of the walk-forward backtest
///
/// Produced once, ordered by date ascending. Inactive methodologies carry
/// `None`; a recoverable per-day failure sets `failure` and leaves the
/// model-derived fields `None` while the deterministic estimators stay
/// populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub date: NaiveDate,

    /// Realized loss that day (positive-signed)
    pub actual_loss: f64,

    /// Empirical-percentile VaR at 99%
    pub historical_var: Option<f64>,

    /// Normal-quantile VaR at 99%
    pub parametric_var: Option<f64>,

    /// Conditional-volatility VaR at 99%
    pub garch_var: Option<f64>,

    /// Expected Shortfall at 97.5%
    pub expected_shortfall: Option<f64>,

    /// Why the model-derived fields are missing, if they are
    pub failure: Option<String>,
}

impl BacktestRecord {
    fn new(date: NaiveDate, actual_loss: f64) -> Self {
        Self {
            date,
            actual_loss,
            historical_var: None,
            parametric_var: None,
            garch_var: None,
            expected_shortfall: None,
            failure: None,
        }
    }

    /// The VaR estimate for one methodology, if the record carries it.
    /// `All` reads the historical line, matching comparison-mode scoring.
    pub fn value_at_risk(&self, methodology: Methodology) -> Option<f64> {
        match methodology {
            Methodology::Historical | Methodology::All => self.historical_var,
            Methodology::ParametricNormal => self.parametric_var,
            Methodology::ConditionalVolatility => self.garch_var,
        }
    }

    /// Whether this day's model-derived fields were lost to a recoverable
    /// fit or tail-estimation failure.
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Full output of one backtest run: the record sequence plus derived views
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// One record per test day, date ascending
    pub records: Vec<BacktestRecord>,

    /// Exceedance summary for the configured methodology
    pub summary: BacktestSummary,

    /// Descriptive statistics of realized losses over the horizon
    pub loss_stats: LossStatistics,
}

/// Walk-forward backtesting engine holding a validated configuration
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    /// Create an engine, validating the configuration up front
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the backtest over a batch of dated daily closes
    pub fn run(&self, prices: &[PricePoint]) -> Result<BacktestReport> {
        let series = ReturnSeries::from_prices(prices)?;
        self.run_series(&series)
    }

    /// Run the backtest over an already-transformed return series
    pub fn run_series(&self, series: &ReturnSeries) -> Result<BacktestReport> {
        let required = self.config.training_window + self.config.test_horizon;
        if series.len() < required {
            return Err(RiskError::InsufficientHistory {
                required,
                available: series.len(),
            });
        }

        let n = series.len();
        let start = n - self.config.test_horizon;
        debug!(
            window = self.config.training_window,
            horizon = self.config.test_horizon,
            "starting walk-forward backtest"
        );

        let records: Vec<BacktestRecord> = (start..n)
            .into_par_iter()
            .map(|index| self.evaluate_day(series, index))
            .collect();

        let summary = BacktestSummary::from_records(
            &records,
            self.config.methodology.scored(),
            self.config.stability_threshold,
        );
        let loss_stats = LossStatistics::from_records(&records);

        Ok(BacktestReport {
            records,
            summary,
            loss_stats,
        })
    }

    /// Evaluate one test day: pure function of the trailing window.
    fn evaluate_day(&self, series: &ReturnSeries, index: usize) -> BacktestRecord {
        let config = &self.config;
        let window = &series.values()[index - config.training_window..index];
        let date = series.dates()[index];
        let mut record = BacktestRecord::new(date, -series.values()[index]);

        if config.methodology.includes(Methodology::Historical) {
            record.historical_var = Some(historical_var(window, VAR_CONFIDENCE));
        }
        if config.methodology.includes(Methodology::ParametricNormal) {
            record.parametric_var = Some(parametric_var(window, VAR_CONFIDENCE));
        }

        let mut fitted: Option<(GarchStudentT, f64)> = None;
        if config.methodology.includes(Methodology::ConditionalVolatility) {
            let window_pct: Vec<f64> = window.iter().map(|r| r * PERCENT_SCALE).collect();
            match GarchStudentT::fit(&window_pct, config.max_fit_iterations) {
                Ok(fit) => {
                    let nu = config.nu_bound.apply(fit.nu);
                    match fit.loss_quantile(VAR_CONFIDENCE, nu) {
                        Ok(var_pct) => {
                            record.garch_var = Some(var_pct / PERCENT_SCALE);
                            fitted = Some((fit, nu));
                        }
                        Err(err) => {
                            warn!(date = %date, error = %err, "conditional VaR evaluation failed");
                            record.failure = Some(err.to_string());
                        }
                    }
                }
                Err(err) => {
                    warn!(date = %date, error = %err, "volatility fit failed, day carries no model fields");
                    record.failure = Some(err.to_string());
                }
            }
        }

        match config.shortfall {
            ShortfallMethod::HistoricalTail => {
                record.expected_shortfall =
                    Some(historical_expected_shortfall(window, ES_CONFIDENCE));
            }
            ShortfallMethod::Simulated => {
                if let Some((fit, nu)) = &fitted {
                    let mut rng = self.day_rng(index);
                    match simulated_expected_shortfall(
                        fit.forecast_mean,
                        fit.forecast_sigma,
                        *nu,
                        ES_CONFIDENCE,
                        config.simulation_draws,
                        &mut rng,
                    ) {
                        Ok(es_pct) => {
                            record.expected_shortfall = Some(es_pct / PERCENT_SCALE);
                        }
                        Err(err) => {
                            warn!(date = %date, error = %err, "tail simulation degenerate");
                            record.failure = Some(err.to_string());
                        }
                    }
                }
            }
        }

        // Legacy presentation floor: an explicit, opt-in post-processing
        // step, never part of estimation.
        if let (Some(ratio), Some(es), Some(var)) =
            (config.es_floor_ratio, record.expected_shortfall, record.garch_var)
        {
            if es < ratio * var {
                record.expected_shortfall = Some(ratio * var);
            }
        }

        record
    }

    /// Per-day RNG: seeded runs derive one stream per test day so the
    /// parallel schedule cannot change the draws.
    fn day_rng(&self, index: usize) -> StdRng {
        match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(index as u64)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Run a full backtest as a pure function of (price history, configuration)
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use riskbench::{run_backtest, BacktestConfig, Methodology, PricePoint, ShortfallMethod};
///
/// let start = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
/// let prices: Vec<PricePoint> = (0..101i64)
///     .map(|i| PricePoint {
///         date: start + chrono::Duration::days(i),
///         close: 100.0 * (1.0 + 0.002 * (i as f64 * 0.7).sin()),
///     })
///     .collect();
///
/// let config = BacktestConfig {
///     training_window: 60,
///     test_horizon: 20,
///     methodology: Methodology::Historical,
///     shortfall: ShortfallMethod::HistoricalTail,
///     ..BacktestConfig::default()
/// };
///
/// let report = run_backtest(&prices, &config).unwrap();
/// assert_eq!(report.records.len(), 20);
/// ```
pub fn run_backtest(prices: &[PricePoint], config: &BacktestConfig) -> Result<BacktestReport> {
    BacktestEngine::new(config.clone())?.run(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dated_prices(closes: &[f64]) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2018, 1, 2).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                close,
            })
            .collect()
    }

    /// Deterministic price path with mild oscillating returns.
    fn synthetic_prices(n: usize) -> Vec<PricePoint> {
        let mut closes = Vec::with_capacity(n);
        let mut close = 100.0;
        for i in 0..n {
            close *= 1.0 + 0.01 * (i as f64 * 0.83).sin();
            closes.push(close);
        }
        dated_prices(&closes)
    }

    fn deterministic_config() -> BacktestConfig {
        BacktestConfig {
            training_window: 125,
            test_horizon: 40,
            methodology: Methodology::Historical,
            shortfall: ShortfallMethod::HistoricalTail,
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn test_short_series_is_fatal() {
        let engine = BacktestEngine::new(deterministic_config()).unwrap();
        let result = engine.run(&synthetic_prices(100));

        assert!(matches!(
            result,
            Err(RiskError::InsufficientHistory {
                required: 165,
                ..
            })
        ));
    }

    #[test]
    fn test_exact_minimum_length_runs() {
        let engine = BacktestEngine::new(deterministic_config()).unwrap();
        // 166 prices -> 165 returns = window + horizon exactly.
        let report = engine.run(&synthetic_prices(166)).unwrap();
        assert_eq!(report.records.len(), 40);
    }

    #[test]
    fn test_records_are_date_ascending() {
        let engine = BacktestEngine::new(deterministic_config()).unwrap();
        let report = engine.run(&synthetic_prices(200)).unwrap();

        for pair in report.records.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
    }

    #[test]
    fn test_actual_loss_is_negated_return() {
        let prices = synthetic_prices(200);
        let series = ReturnSeries::from_prices(&prices).unwrap();
        let engine = BacktestEngine::new(deterministic_config()).unwrap();
        let report = engine.run_series(&series).unwrap();

        let n = series.len();
        let first_test_day = n - 40;
        assert_eq!(
            report.records[0].actual_loss,
            -series.values()[first_test_day]
        );
        assert_eq!(report.records[0].date, series.dates()[first_test_day]);
    }

    #[test]
    fn test_methodology_selects_populated_fields() {
        let prices = synthetic_prices(200);

        let engine = BacktestEngine::new(deterministic_config()).unwrap();
        let report = engine.run(&prices).unwrap();
        for record in &report.records {
            assert!(record.historical_var.is_some());
            assert!(record.parametric_var.is_none());
            assert!(record.garch_var.is_none());
            assert!(record.expected_shortfall.is_some());
        }

        let config = BacktestConfig {
            methodology: Methodology::ParametricNormal,
            ..deterministic_config()
        };
        let report = BacktestEngine::new(config).unwrap().run(&prices).unwrap();
        for record in &report.records {
            assert!(record.historical_var.is_none());
            assert!(record.parametric_var.is_some());
        }
    }

    #[test]
    fn test_deterministic_rerun_is_identical() {
        let prices = synthetic_prices(220);
        let engine = BacktestEngine::new(deterministic_config()).unwrap();

        let a = engine.run(&prices).unwrap();
        let b = engine.run(&prices).unwrap();

        assert_eq!(a.records.len(), b.records.len());
        for (ra, rb) in a.records.iter().zip(b.records.iter()) {
            assert_eq!(ra.date, rb.date);
            assert_eq!(ra.actual_loss, rb.actual_loss);
            assert_eq!(ra.historical_var, rb.historical_var);
            assert_eq!(ra.expected_shortfall, rb.expected_shortfall);
        }
    }

    #[test]
    fn test_stationary_window_parametric_var_is_constant() {
        // Alternating +-1% log returns: every 504-wide window has mean 0 and
        // sample std ~1%, so the parametric line is flat at ~2.33%.
        let n = 1200usize;
        let mut closes = Vec::with_capacity(n + 1);
        let mut close = 100.0f64;
        closes.push(close);
        for i in 0..n {
            let r: f64 = if i % 2 == 0 { 0.01 } else { -0.01 };
            close *= r.exp();
            closes.push(close);
        }

        let config = BacktestConfig {
            training_window: 504,
            test_horizon: 252,
            methodology: Methodology::ParametricNormal,
            shortfall: ShortfallMethod::HistoricalTail,
            ..BacktestConfig::default()
        };
        let report = BacktestEngine::new(config)
            .unwrap()
            .run(&dated_prices(&closes))
            .unwrap();

        for record in &report.records {
            let var = record.parametric_var.unwrap();
            assert!(
                (var - 0.0233).abs() < 5e-4,
                "expected ~2.33%, got {}",
                var
            );
        }
    }

    #[test]
    fn test_es_floor_engages_only_when_configured() {
        let prices = synthetic_prices(400);
        let base = BacktestConfig {
            training_window: 250,
            test_horizon: 30,
            methodology: Methodology::All,
            shortfall: ShortfallMethod::Simulated,
            random_seed: Some(17),
            ..BacktestConfig::default()
        };

        let plain = BacktestEngine::new(base.clone()).unwrap().run(&prices).unwrap();
        let floored = BacktestEngine::new(BacktestConfig {
            es_floor_ratio: Some(crate::config::LEGACY_ES_FLOOR_RATIO),
            ..base
        })
        .unwrap()
        .run(&prices)
        .unwrap();

        for (p, f) in plain.records.iter().zip(floored.records.iter()) {
            if let (Some(es), Some(var)) = (f.expected_shortfall, f.garch_var) {
                assert!(es >= crate::config::LEGACY_ES_FLOOR_RATIO * var - 1e-12);
            }
            if let (Some(p_es), Some(f_es)) = (p.expected_shortfall, f.expected_shortfall) {
                assert!(f_es >= p_es - 1e-12);
            }
        }
    }
}
