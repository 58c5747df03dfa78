//! Walk-forward backtest example
//!
//! Generates a synthetic daily price history, runs the full backtest with
//! all three VaR methodologies, and prints the record tail and summary.
//!
//! Run with: cargo run --example walk_forward_report

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use riskbench::{run_backtest, BacktestConfig, Methodology, PricePoint, ShortfallMethod, Stability};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== Walk-Forward VaR/ES Backtest Example ===\n");

    // 1. Synthetic price history: ~3 years of daily closes with two
    // volatility regimes so the conditional model has something to track.
    let mut rng = StdRng::seed_from_u64(7);
    let calm = Normal::new(0.0002f64, 0.009)?;
    let stressed = Normal::new(-0.0005f64, 0.022)?;
    let start = NaiveDate::from_ymd_opt(2021, 1, 4).expect("valid calendar date");

    let mut close = 100.0f64;
    let prices: Vec<PricePoint> = (0..800i64)
        .map(|i| {
            let regime = if (i / 120) % 2 == 0 { &calm } else { &stressed };
            close *= regime.sample(&mut rng).exp();
            PricePoint {
                date: start + chrono::Duration::days(i),
                close,
            }
        })
        .collect();

    println!("Price history: {} daily closes", prices.len());

    // 2. Configure the engine: 2-year window, one quarter walked forward.
    let config = BacktestConfig {
        training_window: 504,
        test_horizon: 63,
        methodology: Methodology::All,
        shortfall: ShortfallMethod::Simulated,
        random_seed: Some(42), // reproducible simulated tails
        ..BacktestConfig::default()
    };

    println!(
        "Window: {} days | Horizon: {} days | Draws: {}\n",
        config.training_window, config.test_horizon, config.simulation_draws
    );

    // 3. Run the backtest.
    let started = std::time::Instant::now();
    let report = run_backtest(&prices, &config)?;
    println!(
        "Backtest complete: {} records in {:?}\n",
        report.records.len(),
        started.elapsed()
    );

    // 4. Print the last ten records.
    println!(
        "{:<12} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Date", "Loss", "Hist", "Normal", "GARCH-t", "ES 97.5"
    );
    let fmt = |v: Option<f64>| match v {
        Some(x) => format!("{:>8.2}%", x * 100.0),
        None => format!("{:>9}", "-"),
    };
    for record in report.records.iter().rev().take(10).rev() {
        println!(
            "{:<12} {:>8.2}% {} {} {} {}",
            record.date,
            record.actual_loss * 100.0,
            fmt(record.historical_var),
            fmt(record.parametric_var),
            fmt(record.garch_var),
            fmt(record.expected_shortfall),
        );
    }

    // 5. Summary and loss statistics.
    let summary = &report.summary;
    println!("\n--- Summary ({:?} scored) ---", summary.methodology);
    println!("Exceedances: {} / {} days", summary.exceedance_count, summary.scored_days);
    println!(
        "Model quality: {}",
        match summary.stability {
            Stability::Stable => "STABLE",
            Stability::Weak => "WEAK",
        }
    );

    let stats = &report.loss_stats;
    println!("\n--- Realized losses over the horizon ---");
    println!("Min:  {:>7.2}%", stats.min * 100.0);
    println!("Max:  {:>7.2}%", stats.max * 100.0);
    println!("Mean: {:>7.2}%", stats.mean * 100.0);
    println!("Std:  {:>7.2}%", stats.std_dev * 100.0);

    let failed = report.records.iter().filter(|r| r.is_failed()).count();
    if failed > 0 {
        println!("\n{} day(s) skipped model fields after fit failures", failed);
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
