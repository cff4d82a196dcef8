//! Statevector simulation of QAOA circuits.
//!
//! QAOA consists of:
//! 1. Initial state: |+⟩^n (Hadamard on every qubit)
//! 2. For each layer:
//!    - Phase separator: exp(-i γ C), diagonal in the computational basis
//!    - Mixer: exp(-i β Σ Xⱼ) = Π_j RX(2β)
//!
//! Interlaced layers with angles `(γ, β, δ)` apply the weight term with δ
//! and the constraint term with γ, each followed by a mixer.

use num_complex::Complex64;

use arvak_varopt::{Outcome, ParameterVector};

use crate::problems::Problem;

/// Cost of every basis state, precomputed once per problem.
#[derive(Debug, Clone, PartialEq)]
pub struct CostDiagonals {
    n_qubits: usize,
    /// Full cost.
    pub full: Vec<f64>,
    /// Weight term of the split cost.
    pub weight: Vec<f64>,
    /// Constraint term of the split cost.
    pub constraint: Vec<f64>,
}

impl CostDiagonals {
    /// Tabulate the costs of a problem.
    pub fn from_problem<P: Problem + ?Sized>(problem: &P) -> Self {
        let n_qubits = problem.num_qubits();
        let dim = 1u64 << n_qubits;
        let mut full = Vec::with_capacity(dim as usize);
        let mut weight = Vec::with_capacity(dim as usize);
        let mut constraint = Vec::with_capacity(dim as usize);
        for z in 0..dim {
            let outcome = Outcome(z);
            full.push(problem.cost(outcome));
            let (w, c) = problem.split_cost(outcome);
            weight.push(w);
            constraint.push(c);
        }
        Self {
            n_qubits,
            full,
            weight,
            constraint,
        }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.n_qubits
    }
}

/// The uniform superposition |+⟩^n.
pub fn plus_state(n_qubits: usize) -> Vec<Complex64> {
    let dim = 1usize << n_qubits;
    vec![Complex64::new(1.0 / (dim as f64).sqrt(), 0.0); dim]
}

/// Multiply every amplitude by `exp(-i · angle · diagonal[z])`.
fn apply_phase(state: &mut [Complex64], diagonal: &[f64], angle: f64) {
    for (amp, &c) in state.iter_mut().zip(diagonal) {
        *amp *= Complex64::from_polar(1.0, -angle * c);
    }
}

/// Apply RX(2β) to every qubit.
fn apply_mixer(state: &mut [Complex64], n_qubits: usize, beta: f64) {
    let c = beta.cos();
    let s = beta.sin();
    for q in 0..n_qubits {
        for i in 0..state.len() {
            if (i >> q) & 1 == 0 {
                let j = i | (1 << q);
                let a = state[i];
                let b = state[j];
                state[i] = Complex64::new(c, 0.0) * a - Complex64::new(0.0, s) * b;
                state[j] = Complex64::new(0.0, -s) * a + Complex64::new(c, 0.0) * b;
            }
        }
    }
}

/// Final state of the QAOA circuit with the given angles.
///
/// `params` must have two or three angle classes.
pub fn qaoa_state(costs: &CostDiagonals, params: &ParameterVector) -> Vec<Complex64> {
    let n = costs.n_qubits;
    let mut state = plus_state(n);
    for layer in 0..params.depth() {
        match params.layer(layer) {
            &[gamma, beta] => {
                apply_phase(&mut state, &costs.full, gamma);
                apply_mixer(&mut state, n, beta);
            }
            &[gamma, beta, delta] => {
                apply_phase(&mut state, &costs.weight, delta);
                apply_mixer(&mut state, n, beta);
                apply_phase(&mut state, &costs.constraint, gamma);
                apply_mixer(&mut state, n, beta);
            }
            _ => {}
        }
    }
    state
}

/// Measurement probabilities of a state, renormalized against rounding.
pub fn probabilities(state: &[Complex64]) -> Vec<f64> {
    let probs: Vec<f64> = state.iter().map(|a| a.norm_sqr()).collect();
    let total: f64 = probs.iter().sum();
    probs.into_iter().map(|p| p / total).collect()
}
