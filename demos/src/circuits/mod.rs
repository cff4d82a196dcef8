//! Statevector circuits for demos.

pub mod qaoa;

pub use qaoa::{CostDiagonals, plus_state, probabilities, qaoa_state};
