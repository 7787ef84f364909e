use std::cmp::Ordering;
use std::f64::consts::PI;

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::config::FitSettings;
use crate::errors::ForecastError;
use crate::types::ReturnSeries;

/// Number of hidden regimes. The recursions below are written over
/// `n_states` so the structure generalizes, but the public model is fixed
/// at two regimes (bear / bull).
pub const N_STATES: usize = 2;

const MIN_EM_ITERATIONS: usize = 5;
const MIN_SPLIT_SIZE: usize = 5;
const INIT_SIGMA_FLOOR: f64 = 1e-4;
const DENSITY_SIGMA_FLOOR: f64 = 1e-8;
const VARIANCE_FLOOR: f64 = 1e-10;
const PROB_FLOOR: f64 = 1e-16;

/// Fitted two-regime Gaussian HMM parameters. Invariant: `mu` is sorted
/// ascending (state 0 = lower-mean regime), with `sigma`, `transition` and
/// `start_prob` permuted consistently. Never mutated after fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct HmmParams {
    /// Monthly mean log-return per regime.
    pub mu: Array1<f64>,
    /// Monthly log-return stdev per regime, strictly positive.
    pub sigma: Array1<f64>,
    /// Row-stochastic transition matrix.
    pub transition: Array2<f64>,
    /// Initial-state distribution.
    pub start_prob: Array1<f64>,
}

impl HmmParams {
    pub fn n_states(&self) -> usize {
        self.mu.len()
    }
}

/// Result of one EM fit: parameters, state posteriors over the history, and
/// the full log-likelihood trajectory (one entry per iteration).
#[derive(Debug, Clone)]
pub struct HmmFit {
    pub params: HmmParams,
    /// T x K posterior probabilities, columns in canonical state order.
    pub gamma: Array2<f64>,
    pub log_likelihood: Vec<f64>,
    pub converged: bool,
}

/// Baum-Welch EM fitter for the two-regime Gaussian HMM.
#[derive(Debug, Clone)]
pub struct HmmFitter {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub init_persistence: f64,
    pub min_observations: usize,
}

impl Default for HmmFitter {
    fn default() -> Self {
        Self::from_config(&FitSettings::default())
    }
}

impl HmmFitter {
    pub fn from_config(settings: &FitSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            tolerance: settings.tolerance,
            seed: settings.seed,
            init_persistence: settings.init_persistence,
            min_observations: settings.min_observations,
        }
    }

    /// Fit the model to a monthly log-return series. Reaching the iteration
    /// cap without convergence is not an error: the best estimate at the cap
    /// is returned and callers can inspect the trailing likelihood deltas.
    pub fn fit(&self, series: &ReturnSeries) -> Result<HmmFit, ForecastError> {
        let x = series.values();
        let t_len = x.len();
        if t_len < self.min_observations {
            return Err(ForecastError::InsufficientData {
                got: t_len,
                need: self.min_observations,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut params = self.initial_params(x, &mut rng);
        let mut gamma = Array2::zeros((t_len, N_STATES));
        let mut log_likelihood = Vec::with_capacity(self.max_iterations);
        let mut converged = false;

        for iteration in 0..self.max_iterations {
            // E-step, entirely in log space.
            let log_b = log_emission_probs(x, &params.mu, &params.sigma);
            let log_a = params.transition.mapv(|p| p.max(PROB_FLOOR).ln());
            let log_pi = params.start_prob.mapv(|p| p.max(PROB_FLOOR).ln());

            // Forward recursion.
            let mut log_alpha = Array2::from_elem((t_len, N_STATES), f64::NEG_INFINITY);
            for j in 0..N_STATES {
                log_alpha[[0, j]] = log_pi[j] + log_b[[0, j]];
            }
            for t in 1..t_len {
                for j in 0..N_STATES {
                    let terms: Vec<f64> = (0..N_STATES)
                        .map(|i| log_alpha[[t - 1, i]] + log_a[[i, j]])
                        .collect();
                    log_alpha[[t, j]] = log_sum_exp(&terms) + log_b[[t, j]];
                }
            }

            let loglik = log_sum_exp(&log_alpha.row(t_len - 1).to_vec());
            log_likelihood.push(loglik);
            debug!("EM iteration {}: loglik={:.6}", iteration, loglik);

            // Backward recursion.
            let mut log_beta = Array2::from_elem((t_len, N_STATES), 0.0);
            for t in (0..t_len - 1).rev() {
                for i in 0..N_STATES {
                    let terms: Vec<f64> = (0..N_STATES)
                        .map(|j| log_a[[i, j]] + log_b[[t + 1, j]] + log_beta[[t + 1, j]])
                        .collect();
                    log_beta[[t, i]] = log_sum_exp(&terms);
                }
            }

            // State posteriors, normalized per timestep.
            for t in 0..t_len {
                let row: Vec<f64> = (0..N_STATES)
                    .map(|j| log_alpha[[t, j]] + log_beta[[t, j]])
                    .collect();
                let denom = log_sum_exp(&row);
                for j in 0..N_STATES {
                    gamma[[t, j]] = (row[j] - denom).exp();
                }
            }

            // Pairwise transition posteriors, normalized jointly over the
            // KxK grid per consecutive pair, summed over time.
            let mut xi_sum: Array2<f64> = Array2::zeros((N_STATES, N_STATES));
            for t in 0..t_len - 1 {
                let mut grid = [0.0f64; N_STATES * N_STATES];
                for i in 0..N_STATES {
                    for j in 0..N_STATES {
                        grid[i * N_STATES + j] = log_alpha[[t, i]]
                            + log_a[[i, j]]
                            + log_b[[t + 1, j]]
                            + log_beta[[t + 1, j]];
                    }
                }
                let denom = log_sum_exp(&grid);
                for i in 0..N_STATES {
                    for j in 0..N_STATES {
                        xi_sum[[i, j]] += (grid[i * N_STATES + j] - denom).exp();
                    }
                }
            }

            // M-step.
            let mut start_prob = gamma.row(0).to_owned();
            let total = start_prob.sum().max(PROB_FLOOR);
            start_prob.mapv_inplace(|v| v / total);

            let mut transition = Array2::zeros((N_STATES, N_STATES));
            for i in 0..N_STATES {
                let row_sum = xi_sum.row(i).sum().max(PROB_FLOOR);
                for j in 0..N_STATES {
                    transition[[i, j]] = xi_sum[[i, j]] / row_sum;
                }
            }

            let mut mu = Array1::zeros(N_STATES);
            let mut sigma = Array1::zeros(N_STATES);
            for state in 0..N_STATES {
                let weight = gamma.column(state).sum().max(PROB_FLOOR);
                let mean = (0..t_len).map(|t| gamma[[t, state]] * x[t]).sum::<f64>() / weight;
                let var = (0..t_len)
                    .map(|t| gamma[[t, state]] * (x[t] - mean).powi(2))
                    .sum::<f64>()
                    / weight;
                mu[state] = mean;
                sigma[state] = var.max(VARIANCE_FLOOR).sqrt();
            }

            params = HmmParams {
                mu,
                sigma,
                transition,
                start_prob,
            };

            // Keep state 0 the lower-mean regime across iterations.
            canonicalize(&mut params, &mut gamma);

            if iteration >= MIN_EM_ITERATIONS {
                let delta = (log_likelihood[iteration] - log_likelihood[iteration - 1]).abs();
                if delta < self.tolerance {
                    converged = true;
                    break;
                }
            }
        }

        Ok(HmmFit {
            params,
            gamma,
            log_likelihood,
            converged,
        })
    }

    /// Seed per-regime mean/stdev from a median split of the observations.
    /// A split leaving fewer than `MIN_SPLIT_SIZE` points on either side
    /// falls back to a random bisection.
    fn initial_params(&self, x: &[f64], rng: &mut StdRng) -> HmmParams {
        let mut sorted = x.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            0.5 * (sorted[mid - 1] + sorted[mid])
        } else {
            sorted[mid]
        };

        let mut low: Vec<f64> = x.iter().copied().filter(|v| *v <= median).collect();
        let mut high: Vec<f64> = x.iter().copied().filter(|v| *v > median).collect();
        if low.len() < MIN_SPLIT_SIZE || high.len() < MIN_SPLIT_SIZE {
            debug!("degenerate median split, falling back to random bisection");
            let mut indices: Vec<usize> = (0..x.len()).collect();
            indices.shuffle(rng);
            let cut = x.len() / 2;
            low = indices[..cut].iter().map(|&i| x[i]).collect();
            high = indices[cut..].iter().map(|&i| x[i]).collect();
        }

        let mu = Array1::from(vec![sample_mean(&low), sample_mean(&high)]);
        let sigma = Array1::from(vec![
            sample_std(&low).max(INIT_SIGMA_FLOOR),
            sample_std(&high).max(INIT_SIGMA_FLOOR),
        ]);

        let off_diag = (1.0 - self.init_persistence) / (N_STATES - 1) as f64;
        let mut transition = Array2::from_elem((N_STATES, N_STATES), off_diag);
        for i in 0..N_STATES {
            transition[[i, i]] = self.init_persistence;
        }
        let start_prob = Array1::from_elem(N_STATES, 1.0 / N_STATES as f64);

        HmmParams {
            mu,
            sigma,
            transition,
            start_prob,
        }
    }
}

/// Gaussian log-density of every observation under every state, T x K.
fn log_emission_probs(x: &[f64], mu: &Array1<f64>, sigma: &Array1<f64>) -> Array2<f64> {
    let k = mu.len();
    let mut out = Array2::zeros((x.len(), k));
    for (t, &obs) in x.iter().enumerate() {
        for state in 0..k {
            let sd = sigma[state].max(DENSITY_SIGMA_FLOOR);
            let z = (obs - mu[state]) / sd;
            out[[t, state]] = -0.5 * (2.0 * PI).ln() - sd.ln() - 0.5 * z * z;
        }
    }
    out
}

/// Reorder states by ascending mean, applying the identical permutation to
/// sigma, the transition matrix (rows and columns), the initial distribution
/// and the posterior columns in one atomic operation. Guards against label
/// switching between EM iterations.
fn canonicalize(params: &mut HmmParams, gamma: &mut Array2<f64>) {
    let k = params.n_states();
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        params.mu[a]
            .partial_cmp(&params.mu[b])
            .unwrap_or(Ordering::Equal)
    });
    if order.iter().enumerate().all(|(i, &s)| i == s) {
        return;
    }

    let mu = Array1::from_iter(order.iter().map(|&s| params.mu[s]));
    let sigma = Array1::from_iter(order.iter().map(|&s| params.sigma[s]));
    let mut start_prob = Array1::from_iter(order.iter().map(|&s| params.start_prob[s]));
    let total = start_prob.sum().max(PROB_FLOOR);
    start_prob.mapv_inplace(|v| v / total);

    let mut transition = Array2::zeros((k, k));
    for i in 0..k {
        for j in 0..k {
            transition[[i, j]] = params.transition[[order[i], order[j]]];
        }
    }

    let old_gamma = gamma.clone();
    for t in 0..gamma.nrows() {
        for (i, &s) in order.iter().enumerate() {
            gamma[[t, i]] = old_gamma[[t, s]];
        }
    }

    *params = HmmParams {
        mu,
        sigma,
        transition,
        start_prob,
    };
}

/// Log-sum-exp trick for numerical stability.
fn log_sum_exp(log_values: &[f64]) -> f64 {
    let max_val = log_values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let sum_exp: f64 = log_values.iter().map(|&v| (v - max_val).exp()).sum();
    max_val + sum_exp.ln()
}

fn sample_mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (ddof = 1).
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = sample_mean(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
