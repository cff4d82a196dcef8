//! COBYLA-style optimizer (Constrained Optimization BY Linear Approximations).
//!
//! Each iteration fits a linear model of the objective from samples at
//! distance `rho` around the current point and steps against the model
//! gradient inside the box. When neither the samples nor the step improve on
//! the current point, the trust radius is halved, down to `rho_end`.

use serde::{Deserialize, Serialize};

use super::{OptimizationResult, Optimizer, Tracked};

/// COBYLA-style trust-region optimizer with box constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cobyla {
    /// Initial trust radius.
    pub rho_begin: f64,
    /// Final trust radius.
    pub rho_end: f64,
    /// Evaluation budget.
    pub maxiter: usize,
    /// Per-parameter `(lower, upper)` box; empty means unconstrained.
    #[serde(skip)]
    pub bounds: Vec<(f64, f64)>,
}

impl Default for Cobyla {
    fn default() -> Self {
        Self {
            rho_begin: 0.5,
            rho_end: 1e-4,
            maxiter: 1000,
            bounds: Vec::new(),
        }
    }
}

impl Cobyla {
    /// Create with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set parameter bounds
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set the initial and final trust radius.
    pub fn with_rho(mut self, rho_begin: f64, rho_end: f64) -> Self {
        self.rho_begin = rho_begin;
        self.rho_end = rho_end;
        self
    }

    /// Set the evaluation budget.
    pub fn with_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    /// Project parameters onto bounds
    fn project(&self, params: &[f64]) -> Vec<f64> {
        params
            .iter()
            .enumerate()
            .map(|(i, &p)| match self.bounds.get(i) {
                Some(&(lo, hi)) => p.clamp(lo, hi),
                None => p,
            })
            .collect()
    }
}

impl Optimizer for Cobyla {
    fn minimize<F>(&self, objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = initial_params.len();
        let mut x = self.project(&initial_params);
        let mut f = Tracked::new(objective, &x);
        let mut rho = self.rho_begin;
        let mut iterations = 0;
        let mut converged = false;

        let Some(mut fx) = f.call(&x) else {
            return f.finish(0, false);
        };

        'search: while f.evaluations() < self.maxiter {
            if rho < self.rho_end || n == 0 {
                converged = true;
                break;
            }
            iterations += 1;

            // linear model from one sample per coordinate
            let mut gradient = vec![0.0; n];
            let mut best_sample: Option<(Vec<f64>, f64)> = None;
            for i in 0..n {
                let mut sample = x.clone();
                sample[i] += rho;
                sample = self.project(&sample);
                if (sample[i] - x[i]).abs() < f64::EPSILON {
                    sample[i] -= rho;
                    sample = self.project(&sample);
                }
                let step = sample[i] - x[i];
                if step.abs() < f64::EPSILON {
                    continue;
                }
                let Some(fp) = f.call(&sample) else {
                    break 'search;
                };
                gradient[i] = (fp - fx) / step;
                if fp < best_sample.as_ref().map_or(fx, |(_, v)| *v) {
                    best_sample = Some((sample, fp));
                }
            }

            let norm = gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
            let mut candidate = best_sample;
            if norm > 0.0 {
                let trial: Vec<f64> = x
                    .iter()
                    .zip(&gradient)
                    .map(|(&xi, &g)| xi - rho * g / norm)
                    .collect();
                let trial = self.project(&trial);
                let Some(ft) = f.call(&trial) else {
                    break 'search;
                };
                if ft < candidate.as_ref().map_or(fx, |(_, v)| *v) {
                    candidate = Some((trial, ft));
                }
            }

            match candidate {
                Some((xn, fnew)) => {
                    x = xn;
                    fx = fnew;
                }
                None => rho *= 0.5,
            }
        }

        f.finish(iterations, converged)
    }

    fn supports_bounds(&self) -> bool {
        true
    }
}
