//! Demo runners for executing quantum algorithms.

pub mod qaoa;

pub use qaoa::{QaoaResult, QaoaRunner};
