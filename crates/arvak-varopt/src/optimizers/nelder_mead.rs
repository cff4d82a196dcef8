//! Nelder-Mead simplex method.
//!
//! A derivative-free optimizer that works well for noisy quantum cost
//! function evaluations. Uses a simplex of n+1 points in n dimensions.
//! Coefficients and the initial simplex follow the usual scipy choices.

use serde::{Deserialize, Serialize};

use super::{OptimizationResult, Optimizer, Tracked};

/// Reflection coefficient.
const ALPHA: f64 = 1.0;
/// Expansion coefficient.
const GAMMA: f64 = 2.0;
/// Contraction coefficient.
const RHO: f64 = 0.5;
/// Shrink coefficient.
const SIGMA: f64 = 0.5;

/// Relative initial step for non-zero coordinates.
const NONZERO_STEP: f64 = 0.05;
/// Initial step for zero coordinates.
const ZERO_STEP: f64 = 0.00025;

/// Nelder-Mead simplex optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    /// Absolute tolerance on the simplex size.
    pub xatol: f64,
    /// Absolute tolerance on the spread of simplex values.
    pub fatol: f64,
    /// Evaluation budget.
    pub max_evaluations: usize,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            xatol: 1e-2,
            fatol: 1e-1,
            max_evaluations: 1000,
        }
    }
}

impl NelderMead {
    /// Create with default tolerances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simplex size tolerance.
    pub fn with_xatol(mut self, xatol: f64) -> Self {
        self.xatol = xatol;
        self
    }

    /// Set the value spread tolerance.
    pub fn with_fatol(mut self, fatol: f64) -> Self {
        self.fatol = fatol;
        self
    }

    /// Set the evaluation budget.
    pub fn with_max_evaluations(mut self, max: usize) -> Self {
        self.max_evaluations = max;
        self
    }

    fn converged(&self, simplex: &[Vec<f64>], values: &[f64]) -> bool {
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|f| (f - values[0]).abs())
            .fold(0.0, f64::max);
        x_spread <= self.xatol && f_spread <= self.fatol
    }
}

/// Sort vertices by value, best first.
fn sort_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}

/// `centroid + coef · (centroid − worst)`.
fn along(centroid: &[f64], worst: &[f64], coef: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(worst)
        .map(|(&c, &w)| c + coef * (c - w))
        .collect()
}

impl Optimizer for NelderMead {
    fn minimize<F>(&self, objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        let n = initial_params.len();
        let mut f = Tracked::new(objective, &initial_params);
        let mut iterations = 0;
        let mut converged = false;

        if n == 0 {
            f.call(&initial_params);
            return f.finish(0, true);
        }

        let mut simplex = Vec::with_capacity(n + 1);
        simplex.push(initial_params.clone());
        for k in 0..n {
            let mut vertex = initial_params.clone();
            vertex[k] = if vertex[k] != 0.0 {
                (1.0 + NONZERO_STEP) * vertex[k]
            } else {
                ZERO_STEP
            };
            simplex.push(vertex);
        }

        let mut values = Vec::with_capacity(n + 1);
        for vertex in &simplex {
            match f.call(vertex) {
                Some(v) => values.push(v),
                None => return f.finish(0, false),
            }
        }
        sort_simplex(&mut simplex, &mut values);

        'search: while f.evaluations() < self.max_evaluations {
            if self.converged(&simplex, &values) {
                converged = true;
                break;
            }
            iterations += 1;

            let mut centroid = vec![0.0; n];
            for vertex in &simplex[..n] {
                for (c, v) in centroid.iter_mut().zip(vertex) {
                    *c += v / n as f64;
                }
            }

            let xr = along(&centroid, &simplex[n], ALPHA);
            let Some(fxr) = f.call(&xr) else { break };

            let mut shrink = false;
            if fxr < values[0] {
                let xe = along(&centroid, &simplex[n], ALPHA * GAMMA);
                let Some(fxe) = f.call(&xe) else { break };
                if fxe < fxr {
                    simplex[n] = xe;
                    values[n] = fxe;
                } else {
                    simplex[n] = xr;
                    values[n] = fxr;
                }
            } else if fxr < values[n - 1] {
                simplex[n] = xr;
                values[n] = fxr;
            } else if fxr < values[n] {
                // outside contraction
                let xc = along(&centroid, &simplex[n], RHO * ALPHA);
                let Some(fxc) = f.call(&xc) else { break };
                if fxc <= fxr {
                    simplex[n] = xc;
                    values[n] = fxc;
                } else {
                    shrink = true;
                }
            } else {
                // inside contraction
                let xcc = along(&centroid, &simplex[n], -RHO);
                let Some(fxcc) = f.call(&xcc) else { break };
                if fxcc < values[n] {
                    simplex[n] = xcc;
                    values[n] = fxcc;
                } else {
                    shrink = true;
                }
            }

            if shrink {
                for j in 1..=n {
                    let shrunk: Vec<f64> = simplex[0]
                        .iter()
                        .zip(&simplex[j])
                        .map(|(&b, &x)| b + SIGMA * (x - b))
                        .collect();
                    let Some(v) = f.call(&shrunk) else {
                        break 'search;
                    };
                    simplex[j] = shrunk;
                    values[j] = v;
                }
            }

            sort_simplex(&mut simplex, &mut values);
        }

        f.finish(iterations, converged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sphere(x: &[f64]) -> f64 {
        (x[0] - 1.0).powi(2) + (x[1] + 0.5).powi(2)
    }

    #[test]
    fn test_minimizes_quadratic() {
        let nm = NelderMead::new().with_xatol(1e-6).with_fatol(1e-10);
        let r = nm.minimize(sphere, vec![0.0, 0.0]);
        assert!(r.converged);
        assert_abs_diff_eq!(r.optimal_params[0], 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(r.optimal_params[1], -0.5, epsilon = 1e-3);
        assert!(r.optimal_value < 1e-6);
        assert_eq!(r.history.len(), r.num_evaluations);
    }

    #[test]
    fn test_respects_evaluation_budget() {
        let nm = NelderMead::new()
            .with_xatol(0.0)
            .with_fatol(0.0)
            .with_max_evaluations(20);
        let r = nm.minimize(sphere, vec![3.0, 3.0]);
        assert!(!r.converged);
        // one iteration may overrun by at most n + 1 shrink evaluations
        assert!(r.num_evaluations <= 20 + 3);
    }

    #[test]
    fn test_initial_simplex_steps() {
        let mut points = Vec::new();
        let nm = NelderMead::new().with_max_evaluations(3);
        nm.minimize(
            |x: &[f64]| {
                points.push(x.to_vec());
                0.0
            },
            vec![2.0, 0.0],
        );
        assert_eq!(points[0], vec![2.0, 0.0]);
        assert_abs_diff_eq!(points[1][0], 2.1, epsilon = 1e-12);
        assert_eq!(points[2], vec![2.0, 0.00025]);
    }

    #[test]
    fn test_nan_aborts() {
        let nm = NelderMead::new();
        let mut calls = 0;
        let r = nm.minimize(
            |x: &[f64]| {
                calls += 1;
                if calls > 4 { f64::NAN } else { x.iter().sum() }
            },
            vec![1.0, 1.0],
        );
        assert!(r.aborted);
        assert_eq!(calls, 5);
        assert_eq!(r.num_evaluations, 4);
    }
}
