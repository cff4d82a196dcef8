//! Derivative-free minimizers for the local refinement step.

pub mod cobyla;
pub mod nelder_mead;

pub use cobyla::Cobyla;
pub use nelder_mead::NelderMead;

use serde::{Deserialize, Serialize};

/// Result of one minimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Parameters of the lowest value evaluated.
    pub optimal_params: Vec<f64>,
    /// Lowest value evaluated.
    pub optimal_value: f64,
    /// Iterations of the method.
    pub num_iterations: usize,
    /// Objective evaluations.
    pub num_evaluations: usize,
    /// Objective value of every evaluation, in order.
    pub history: Vec<f64>,
    /// Whether the method's own convergence test was met.
    pub converged: bool,
    /// Whether the run stopped on a NaN objective value.
    pub aborted: bool,
}

/// Trait for classical optimizers.
pub trait Optimizer {
    /// Minimize the objective function.
    ///
    /// # Arguments
    /// * `objective` - The function to minimize, takes parameters and returns value
    /// * `initial_params` - Starting point
    ///
    /// A NaN objective value stops the run immediately.
    fn minimize<F>(&self, objective: F, initial_params: Vec<f64>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64;

    /// Whether the optimizer keeps iterates inside box constraints itself.
    fn supports_bounds(&self) -> bool {
        false
    }
}

/// Objective wrapper counting evaluations and tracking the best point.
pub(crate) struct Tracked<F> {
    objective: F,
    best_params: Vec<f64>,
    best_value: f64,
    history: Vec<f64>,
    aborted: bool,
}

impl<F> Tracked<F>
where
    F: FnMut(&[f64]) -> f64,
{
    pub(crate) fn new(objective: F, start: &[f64]) -> Self {
        Self {
            objective,
            best_params: start.to_vec(),
            best_value: f64::INFINITY,
            history: Vec::new(),
            aborted: false,
        }
    }

    /// Evaluate; `None` once the objective has returned NaN.
    pub(crate) fn call(&mut self, x: &[f64]) -> Option<f64> {
        if self.aborted {
            return None;
        }
        let value = (self.objective)(x);
        if value.is_nan() {
            self.aborted = true;
            return None;
        }
        self.history.push(value);
        if value < self.best_value {
            self.best_value = value;
            self.best_params = x.to_vec();
        }
        Some(value)
    }

    pub(crate) fn evaluations(&self) -> usize {
        self.history.len()
    }

    pub(crate) fn finish(self, num_iterations: usize, converged: bool) -> OptimizationResult {
        OptimizationResult {
            optimal_params: self.best_params,
            optimal_value: self.best_value,
            num_iterations,
            num_evaluations: self.history.len(),
            history: self.history,
            converged: converged && !self.aborted,
            aborted: self.aborted,
        }
    }
}
