//! Expected Shortfall (tail-mean) estimation at 97.5%
//!
//! Two interchangeable strategies:
//!
//! - Historical tail-mean: average of windowed losses at or beyond the
//!   97.5th percentile. Deterministic.
//! - Simulated tail-mean: draw synthetic one-step returns from the fitted
//!   conditional Student-t distribution, average the worst 2.5%.
//!
//! ES >= VaR is an invariant of any sound estimator, not something this
//! module enforces; a simulated ES falling short of VaR is a model-quality
//! signal the caller may inspect. The legacy 1.20x visual floor lives in
//! the backtester as an explicit opt-in post-processing step.

use rand::rngs::StdRng;
use rand_distr::{Distribution, StudentT};

use crate::error::{Result, RiskError};
use crate::models::interpolated_percentile;

/// Tail samples below this leave the simulated mean statistically
/// meaningless (degenerate distribution).
const MIN_TAIL_DRAWS: usize = 10;

/// Mean loss at or beyond the `confidence` percentile of windowed losses
///
/// # Panics
/// Panics if the window is empty or `confidence` is outside `(0, 1)`; the
/// walk-forward engine guarantees both.
pub fn historical_expected_shortfall(returns: &[f64], confidence: f64) -> f64 {
    assert!(!returns.is_empty(), "training window must not be empty");
    assert!(
        confidence > 0.0 && confidence < 1.0,
        "confidence must be in (0,1)"
    );

    let mut losses: Vec<f64> = returns.iter().map(|r| -r).collect();
    losses.sort_by(|a, b| a.total_cmp(b));
    let threshold = interpolated_percentile(&losses, confidence);

    let mut tail_sum = 0.0;
    let mut tail_count = 0usize;
    for &loss in losses.iter().rev() {
        if loss < threshold {
            break;
        }
        tail_sum += loss;
        tail_count += 1;
    }

    // The largest order statistic is never below the threshold, so the
    // tail is non-empty.
    (tail_sum / tail_count as f64).max(0.0)
}

/// Mean of the worst `1 - confidence` fraction of returns simulated from a
/// fitted conditional Student-t distribution, as a non-negative loss in the
/// same units as `mean` and `sigma`
///
/// Draws `draws` synthetic returns `mean + sigma * t_nu`, takes the
/// `1 - confidence` percentile of the simulated returns as the tail
/// threshold and averages everything at or below it. Fails with
/// `TailEstimation` when nu does not describe a valid distribution or when
/// too few draws land in the tail.
pub fn simulated_expected_shortfall(
    mean: f64,
    sigma: f64,
    nu: f64,
    confidence: f64,
    draws: usize,
    rng: &mut StdRng,
) -> Result<f64> {
    let student = StudentT::new(nu).map_err(|e| {
        RiskError::TailEstimation(format!("invalid degrees of freedom {}: {}", nu, e))
    })?;

    let mut simulated: Vec<f64> = (0..draws)
        .map(|_| mean + sigma * student.sample(rng))
        .collect();
    simulated.sort_by(|a, b| a.total_cmp(b));

    let threshold = interpolated_percentile(&simulated, 1.0 - confidence);
    let tail: &[f64] = {
        let end = simulated.partition_point(|&r| r <= threshold);
        &simulated[..end]
    };

    if tail.len() < MIN_TAIL_DRAWS {
        return Err(RiskError::TailEstimation(format!(
            "only {} of {} draws in the tail, need {}",
            tail.len(),
            draws,
            MIN_TAIL_DRAWS
        )));
    }

    let tail_mean = tail.iter().sum::<f64>() / tail.len() as f64;
    Ok((-tail_mean).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::historical_var;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use statrs::distribution::{ContinuousCDF, StudentsT};

    #[test]
    fn test_historical_tail_mean_of_known_losses() {
        // Losses 1..=100: the 97.5th percentile is 97.525, so the tail is
        // {98, 99, 100}.
        let returns: Vec<f64> = (1..=100).map(|i| -(i as f64)).collect();
        let es = historical_expected_shortfall(&returns, 0.975);
        assert_relative_eq!(es, 99.0, epsilon = 1e-9);
    }

    #[test]
    fn test_historical_es_dominates_historical_var() {
        let returns: Vec<f64> = (0..750)
            .map(|i| ((i as f64 * 0.937).sin() - 0.05) * 0.02)
            .collect();

        let es = historical_expected_shortfall(&returns, 0.975);
        let var = historical_var(&returns, 0.99);
        assert!(es >= var - 1e-12);
    }

    #[test]
    fn test_all_gains_clamp_to_zero() {
        let returns = vec![0.02; 200];
        assert_eq!(historical_expected_shortfall(&returns, 0.975), 0.0);
    }

    #[test]
    fn test_simulated_es_dominates_conditional_var() {
        // With enough draws the simulated tail mean at 97.5% must clear the
        // 99% Student-t quantile, mirroring the closed-form ordering.
        let (mean, sigma, nu) = (0.02, 1.1, 6.0);
        let mut rng = StdRng::seed_from_u64(42);
        let es = simulated_expected_shortfall(mean, sigma, nu, 0.975, 200_000, &mut rng).unwrap();

        let student = StudentsT::new(0.0, 1.0, nu).unwrap();
        let var = -(mean + sigma * student.inverse_cdf(0.01));
        assert!(es >= var, "es {} should dominate var {}", es, var);
    }

    #[test]
    fn test_simulated_es_is_seed_reproducible() {
        let mut rng_a = StdRng::seed_from_u64(9);
        let mut rng_b = StdRng::seed_from_u64(9);

        let a = simulated_expected_shortfall(0.0, 1.0, 5.0, 0.975, 5_000, &mut rng_a).unwrap();
        let b = simulated_expected_shortfall(0.0, 1.0, 5.0, 0.975, 5_000, &mut rng_b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_too_few_tail_draws_is_degenerate() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = simulated_expected_shortfall(0.0, 1.0, 5.0, 0.975, 40, &mut rng);
        assert!(matches!(result, Err(RiskError::TailEstimation(_))));
    }

    #[test]
    fn test_invalid_nu_is_tail_estimation_error() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = simulated_expected_shortfall(0.0, 1.0, 0.0, 0.975, 1_000, &mut rng);
        assert!(matches!(result, Err(RiskError::TailEstimation(_))));
    }
}
