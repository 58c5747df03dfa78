//! Conditional-volatility VaR: GARCH(1,1) with Student-t innovations
//!
//! Fits the variance recursion
//!
//!   sigma2_t = omega + alpha * eps2_{t-1} + beta * sigma2_{t-1}
//!
//! with eps_t = r_t - mu and eps_t / sigma_t distributed Student-t with nu
//! degrees of freedom, by maximum likelihood over (mu, omega, alpha, beta,
//! nu) using a bounded Nelder-Mead simplex. Inputs are expected in percent
//! units (100x log returns) for numerical conditioning; the caller rescales
//! the outputs.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

use crate::error::{Result, RiskError};

/// Observations below this make the five-parameter fit meaningless.
const MIN_FIT_OBSERVATIONS: usize = 30;

/// Strict stationarity guard on alpha + beta.
const STATIONARITY_LIMIT: f64 = 0.999;

/// Hard floors/ceilings keeping the variance recursion in a stable basin.
const MIN_VARIANCE: f64 = 1e-12;
const MAX_VARIANCE: f64 = 1e6;

/// Simplex convergence tolerance on the objective spread.
const SIMPLEX_TOLERANCE: f64 = 1e-6;

/// Initial simplex step as a fraction of each parameter's bound width.
const INITIAL_STEP: f64 = 0.08;

/// Parameter vector layout: [mu, omega, alpha, beta, nu].
const DIM: usize = 5;

/// A fitted GARCH(1,1)-t model and its one-step-ahead forecast
///
/// `forecast_mean` and `forecast_sigma` are the conditional mean and
/// standard deviation for the day after the training window, in the same
/// percent units as the input returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GarchStudentT {
    /// Conditional mean
    pub mu: f64,
    /// Unconditional variance intercept
    pub omega: f64,
    /// ARCH (shock) coefficient
    pub alpha: f64,
    /// GARCH (persistence) coefficient
    pub beta: f64,
    /// Fitted innovation degrees of freedom, unbounded
    pub nu: f64,
    /// Maximized log-likelihood
    pub log_likelihood: f64,
    /// One-step-ahead conditional mean (percent units)
    pub forecast_mean: f64,
    /// One-step-ahead conditional standard deviation (percent units)
    pub forecast_sigma: f64,
}

impl GarchStudentT {
    /// Fit the model to a training window of percent-unit returns
    ///
    /// Fails with `ModelFit` when the window is too short, the optimizer
    /// does not converge within `max_iterations`, or the optimum is not
    /// finite. The iteration bound guarantees termination.
    pub fn fit(returns: &[f64], max_iterations: usize) -> Result<Self> {
        if returns.len() < MIN_FIT_OBSERVATIONS {
            return Err(RiskError::ModelFit(format!(
                "need at least {} observations, got {}",
                MIN_FIT_OBSERVATIONS,
                returns.len()
            )));
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let init_var = variance.clamp(MIN_VARIANCE, MAX_VARIANCE);

        let bounds = Bounds {
            lower: [-5.0, 1e-8, 0.0, 0.0, 2.05],
            upper: [5.0, (10.0 * init_var).max(1e-6), 0.5, STATIONARITY_LIMIT, 200.0],
        };
        // Start well inside the stationarity region so every initial
        // simplex vertex evaluates to a finite likelihood.
        let initial = [
            mean.clamp(bounds.lower[0], bounds.upper[0]),
            (0.05 * init_var).max(bounds.lower[1]),
            0.05,
            0.85,
            8.0,
        ];

        let best = nelder_mead(&initial, &bounds, max_iterations, |params| {
            let (ll, _) = garch_filter(params, returns, init_var);
            if ll.is_finite() { -ll } else { f64::INFINITY }
        })?;

        let log_likelihood = -best.value;
        if !log_likelihood.is_finite() {
            return Err(RiskError::ModelFit(
                "likelihood did not evaluate to a finite value".to_string(),
            ));
        }

        let [mu, omega, alpha, beta, nu] = best.params;
        let (_, forecast_variance) = garch_filter(&best.params, returns, init_var);

        Ok(Self {
            mu,
            omega,
            alpha,
            beta,
            nu,
            log_likelihood,
            forecast_mean: mu,
            forecast_sigma: forecast_variance.sqrt(),
        })
    }

    /// Volatility persistence alpha + beta.
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// One-step-ahead loss quantile at `confidence`, as a non-negative loss
    /// magnitude in percent units
    ///
    /// `nu` is passed explicitly so the configured degrees-of-freedom bound
    /// applies; see [`crate::NuBound`].
    pub fn loss_quantile(&self, confidence: f64, nu: f64) -> Result<f64> {
        let student = StudentsT::new(0.0, 1.0, nu)
            .map_err(|e| RiskError::ModelFit(format!("invalid degrees of freedom {}: {}", nu, e)))?;
        let q = student.inverse_cdf(1.0 - confidence);
        Ok((-(self.forecast_mean + self.forecast_sigma * q)).max(0.0))
    }
}

/// Runs the variance recursion over the window.
///
/// Returns the total log-likelihood and the one-step-ahead variance
/// forecast. The recursion is seeded with the window's sample variance.
fn garch_filter(params: &[f64; DIM], returns: &[f64], init_var: f64) -> (f64, f64) {
    let [mu, omega, alpha, beta, nu] = *params;

    if omega <= 0.0 || alpha < 0.0 || beta < 0.0 || nu <= 2.0 || alpha + beta >= STATIONARITY_LIMIT
    {
        return (f64::NEG_INFINITY, init_var);
    }

    let norm = ln_gamma((nu + 1.0) / 2.0) - ln_gamma(nu / 2.0) - 0.5 * (nu * PI).ln();

    let mut sigma2 = init_var;
    let mut prev_eps = 0.0;
    let mut ll = 0.0;
    for (t, &r) in returns.iter().enumerate() {
        if t > 0 {
            sigma2 = (omega + alpha * prev_eps * prev_eps + beta * sigma2)
                .clamp(MIN_VARIANCE, MAX_VARIANCE);
        }
        let eps = r - mu;
        let z2 = eps * eps / sigma2;
        ll += norm - 0.5 * sigma2.ln() - 0.5 * (nu + 1.0) * (1.0 + z2 / nu).ln();
        prev_eps = eps;
    }

    let forecast =
        (omega + alpha * prev_eps * prev_eps + beta * sigma2).clamp(MIN_VARIANCE, MAX_VARIANCE);
    (ll, forecast)
}

struct Bounds {
    lower: [f64; DIM],
    upper: [f64; DIM],
}

impl Bounds {
    fn clamp(&self, x: &[f64; DIM]) -> [f64; DIM] {
        let mut out = *x;
        for d in 0..DIM {
            out[d] = out[d].clamp(self.lower[d], self.upper[d]);
        }
        out
    }
}

struct SimplexOptimum {
    params: [f64; DIM],
    value: f64,
}

/// Box-constrained Nelder-Mead simplex minimization.
///
/// Standard reflection/expansion/contraction/shrink coefficients; every
/// candidate is clamped back into the box. Fails with `ModelFit` when the
/// simplex has not collapsed within `max_iterations`.
fn nelder_mead<F>(
    initial: &[f64; DIM],
    bounds: &Bounds,
    max_iterations: usize,
    mut objective: F,
) -> Result<SimplexOptimum>
where
    F: FnMut(&[f64; DIM]) -> f64,
{
    let x0 = bounds.clamp(initial);
    let mut simplex = vec![x0];
    for d in 0..DIM {
        let mut x = x0;
        let step = (bounds.upper[d] - bounds.lower[d]).abs() * INITIAL_STEP;
        x[d] = (x[d] + step).min(bounds.upper[d]);
        if (x[d] - x0[d]).abs() < 1e-14 {
            x[d] = (x0[d] - step).max(bounds.lower[d]);
        }
        simplex.push(bounds.clamp(&x));
    }
    let mut values: Vec<f64> = simplex.iter().map(|x| objective(x)).collect();

    let mut converged = false;
    for _ in 0..max_iterations {
        let mut order: Vec<usize> = (0..simplex.len()).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        simplex = order.iter().map(|&i| simplex[i]).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[DIM];
        let spread = (worst - best).abs();
        if spread <= SIMPLEX_TOLERANCE.max(1e-9 * best.abs()) {
            converged = true;
            break;
        }

        let mut centroid = [0.0; DIM];
        for x in simplex.iter().take(DIM) {
            for d in 0..DIM {
                centroid[d] += x[d] / DIM as f64;
            }
        }

        // Reflection
        let mut xr = [0.0; DIM];
        for d in 0..DIM {
            xr[d] = centroid[d] + (centroid[d] - simplex[DIM][d]);
        }
        let xr = bounds.clamp(&xr);
        let fr = objective(&xr);

        if fr < values[0] {
            // Expansion
            let mut xe = [0.0; DIM];
            for d in 0..DIM {
                xe[d] = centroid[d] + 2.0 * (xr[d] - centroid[d]);
            }
            let xe = bounds.clamp(&xe);
            let fe = objective(&xe);
            if fe < fr {
                simplex[DIM] = xe;
                values[DIM] = fe;
            } else {
                simplex[DIM] = xr;
                values[DIM] = fr;
            }
            continue;
        }

        if fr < values[DIM - 1] {
            simplex[DIM] = xr;
            values[DIM] = fr;
            continue;
        }

        // Contraction toward the worst vertex
        let mut xc = [0.0; DIM];
        for d in 0..DIM {
            xc[d] = centroid[d] + 0.5 * (simplex[DIM][d] - centroid[d]);
        }
        let xc = bounds.clamp(&xc);
        let fc = objective(&xc);
        if fc < values[DIM] {
            simplex[DIM] = xc;
            values[DIM] = fc;
            continue;
        }

        // Shrink toward the best vertex
        for i in 1..=DIM {
            for d in 0..DIM {
                simplex[i][d] = simplex[0][d] + 0.5 * (simplex[i][d] - simplex[0][d]);
            }
            simplex[i] = bounds.clamp(&simplex[i]);
            values[i] = objective(&simplex[i]);
        }
    }

    if !converged {
        return Err(RiskError::ModelFit(format!(
            "optimizer did not converge within {} iterations",
            max_iterations
        )));
    }

    let mut best_index = 0;
    for i in 1..values.len() {
        if values[i] < values[best_index] {
            best_index = i;
        }
    }

    Ok(SimplexOptimum {
        params: simplex[best_index],
        value: values[best_index],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, StudentT};

    /// Synthetic percent-unit GARCH(1,1)-t path with known parameters.
    fn synthetic_garch_returns(n: usize, seed: u64) -> Vec<f64> {
        let (omega, alpha, beta, nu) = (0.05, 0.10, 0.85, 5.0);
        let mut rng = StdRng::seed_from_u64(seed);
        let t_dist = StudentT::new(nu).unwrap();

        let mut sigma2: f64 = omega / (1.0 - alpha - beta);
        let mut prev_eps = 0.0;
        let mut returns = Vec::with_capacity(n);
        for i in 0..n {
            if i > 0 {
                sigma2 = omega + alpha * prev_eps * prev_eps + beta * sigma2;
            }
            let eps = sigma2.sqrt() * t_dist.sample(&mut rng);
            returns.push(eps);
            prev_eps = eps;
        }
        returns
    }

    #[test]
    fn test_fit_recovers_plausible_parameters() {
        let returns = synthetic_garch_returns(500, 7);
        let fit = GarchStudentT::fit(&returns, 800).unwrap();

        assert!(fit.omega > 0.0);
        assert!(fit.alpha >= 0.0 && fit.beta >= 0.0);
        assert!(fit.persistence() < 1.0);
        assert!(fit.nu > 2.0);
        assert!(fit.forecast_sigma > 0.0);
        assert!(fit.log_likelihood.is_finite());
    }

    #[test]
    fn test_fit_is_deterministic() {
        let returns = synthetic_garch_returns(400, 11);
        let a = GarchStudentT::fit(&returns, 800).unwrap();
        let b = GarchStudentT::fit(&returns, 800).unwrap();

        assert_eq!(a.mu, b.mu);
        assert_eq!(a.forecast_sigma, b.forecast_sigma);
        assert_eq!(a.log_likelihood, b.log_likelihood);
    }

    #[test]
    fn test_short_window_rejected() {
        let returns = vec![0.1; MIN_FIT_OBSERVATIONS - 1];
        assert!(matches!(
            GarchStudentT::fit(&returns, 800),
            Err(RiskError::ModelFit(_))
        ));
    }

    #[test]
    fn test_loss_quantile_positive_and_fatter_for_lower_nu() {
        let returns = synthetic_garch_returns(500, 3);
        let fit = GarchStudentT::fit(&returns, 800).unwrap();

        let var_nu6 = fit.loss_quantile(0.99, 6.0).unwrap();
        let var_nu50 = fit.loss_quantile(0.99, 50.0).unwrap();

        assert!(var_nu6 > 0.0);
        // Fatter tails push the 1% quantile further out.
        assert!(var_nu6 > var_nu50);
    }

    #[test]
    fn test_filter_rejects_nonstationary_candidates() {
        let returns = synthetic_garch_returns(100, 1);
        let params = [0.0, 0.05, 0.6, 0.6, 5.0];
        let (ll, _) = garch_filter(&params, &returns, 1.0);
        assert_eq!(ll, f64::NEG_INFINITY);
    }

    #[test]
    fn test_forecast_variance_elevated_after_shock() {
        // A large final shock must raise the one-step forecast above the
        // forecast from the same window without the shock.
        let mut calm = synthetic_garch_returns(400, 21);
        let fit_calm = GarchStudentT::fit(&calm, 800).unwrap();

        let last = calm.len() - 1;
        calm[last] = 8.0; // an 8% day in percent units
        let fit_shock = GarchStudentT::fit(&calm, 800).unwrap();

        assert!(fit_shock.forecast_sigma > fit_calm.forecast_sigma);
    }
}
