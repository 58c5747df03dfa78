//! Parametric-normal VaR
//!
//! `VaR = -(mu + sigma * Phi^-1(1 - confidence))` from the training
//! window's sample mean and (n-1) standard deviation. Deterministic, O(W).

use statrs::distribution::{ContinuousCDF, Normal};

/// Normal-quantile VaR from a window of returns
///
/// A zero-variance window yields `-mu` (zero for a flat window of zeros);
/// no division is performed anywhere, so degenerate windows cannot panic.
/// The result is clamped non-negative.
///
/// # Panics
/// Panics if the window is empty or `confidence` is outside `(0, 1)`; the
/// walk-forward engine guarantees both.
pub fn parametric_var(returns: &[f64], confidence: f64) -> f64 {
    assert!(!returns.is_empty(), "training window must not be empty");
    assert!(
        confidence > 0.0 && confidence < 1.0,
        "confidence must be in (0,1)"
    );

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;

    let std_dev = if returns.len() < 2 {
        0.0
    } else {
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    };

    // Standard normal is a fixed, valid parameterization.
    let normal = Normal::new(0.0, 1.0).expect("unit normal is always valid");
    let z = normal.inverse_cdf(1.0 - confidence);

    (-(mean + std_dev * z)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_moments() {
        // Alternating +1%/-1% returns: sample mean 0, sample std just over
        // 0.01, so 99% VaR sits at -sigma * Phi^-1(0.01) ~= 2.33%.
        let returns: Vec<f64> = (0..504)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();

        let var = parametric_var(&returns, 0.99);
        assert_relative_eq!(var, 0.0233, epsilon = 5e-4);
    }

    #[test]
    fn test_zero_variance_window() {
        let returns = vec![0.0; 250];
        assert_eq!(parametric_var(&returns, 0.99), 0.0);
    }

    #[test]
    fn test_identical_nonzero_returns_do_not_panic() {
        // Flat drift, zero dispersion: the quantile collapses onto -mu.
        let returns = vec![-0.004; 250];
        let var = parametric_var(&returns, 0.99);
        assert_relative_eq!(var, 0.004, epsilon = 1e-12);
    }

    #[test]
    fn test_monotone_in_confidence() {
        let returns: Vec<f64> = (0..300)
            .map(|i| ((i as f64 * 1.37).cos()) * 0.015)
            .collect();

        assert!(parametric_var(&returns, 0.995) >= parametric_var(&returns, 0.99));
    }

    #[test]
    fn test_negative_mean_widens_var() {
        let flat: Vec<f64> = (0..300)
            .map(|i| if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let drifting: Vec<f64> = flat.iter().map(|r| r - 0.002).collect();

        assert!(parametric_var(&drifting, 0.99) > parametric_var(&flat, 0.99));
    }
}
