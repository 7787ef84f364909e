#![allow(dead_code)]
use ndarray::{Array1, Array2};

use super::gaussian_hmm::HmmParams;
use super::MONTHS_PER_YEAR;

const MAX_POWER_ITERATIONS: usize = 20_000;
const POWER_TOLERANCE: f64 = 1e-13;
const ABSORBING_EPS: f64 = 1e-12;

/// Long-run annualized statistics implied by the stationary regime mixture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongRunStats {
    /// Geometric expected annual growth, e.g. 0.08 = 8%.
    pub annual_growth: f64,
    /// Annualized log-return volatility, e.g. 0.22 = 22%.
    pub annual_volatility: f64,
    pub monthly_mean: f64,
    pub monthly_variance: f64,
}

/// Stationary distribution w solving w·A = w: the dominant left eigenvector
/// of the transition matrix at eigenvalue 1. Two-state chains admit the
/// exact solution w = (a10, a01) / (a01 + a10), which covers persistent and
/// periodic matrices alike. A chain with two absorbing states has no unique
/// w and falls through to damped power iteration (averaging with the
/// previous iterate keeps periodic chains convergent), which stops on the
/// fixed-point residual |w·A - w| so slow-mixing chains are not cut off
/// before reaching the eigenvector. Negative numerical noise is clipped
/// before normalizing to sum 1.
pub fn stationary_distribution(transition: &Array2<f64>) -> Array1<f64> {
    let k = transition.nrows();

    if k == 2 {
        let a01 = transition[[0, 1]];
        let a10 = transition[[1, 0]];
        let exit = a01 + a10;
        if exit > ABSORBING_EPS {
            return clip_normalize(Array1::from(vec![a10 / exit, a01 / exit]));
        }
    }

    let mut w = Array1::from_elem(k, 1.0 / k as f64);
    for _ in 0..MAX_POWER_ITERATIONS {
        let stepped = w.dot(transition);
        let residual = stepped
            .iter()
            .zip(w.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        if residual < POWER_TOLERANCE {
            break;
        }
        w = (&w + &stepped) * 0.5;
    }
    clip_normalize(w)
}

fn clip_normalize(mut w: Array1<f64>) -> Array1<f64> {
    w.mapv_inplace(|v| v.max(0.0));
    let total = w.sum();
    if total > 0.0 {
        w.mapv_inplace(|v| v / total);
    }
    w
}

/// Annualized growth and volatility of the stationary regime mixture.
/// Mixture variance follows the law of total variance: within-regime
/// variance plus squared deviation of the regime mean from the mixture
/// mean, stationary-weighted. Growth is the geometric expectation
/// exp(12·mu) - 1, not the arithmetic mean.
pub fn long_run_stats(params: &HmmParams, weights: &Array1<f64>) -> LongRunStats {
    let k = params.n_states();
    let monthly_mean: f64 = (0..k).map(|s| weights[s] * params.mu[s]).sum();
    let monthly_variance: f64 = (0..k)
        .map(|s| {
            weights[s] * (params.sigma[s].powi(2) + (params.mu[s] - monthly_mean).powi(2))
        })
        .sum();

    let annual_log_mean = MONTHS_PER_YEAR as f64 * monthly_mean;
    let annual_volatility = (MONTHS_PER_YEAR as f64 * monthly_variance).sqrt();

    LongRunStats {
        annual_growth: annual_log_mean.exp() - 1.0,
        annual_volatility,
        monthly_mean,
        monthly_variance,
    }
}
