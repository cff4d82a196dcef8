//! Problem definitions for QAOA.
//!
//! A problem assigns a cost to every computational basis state; bit `q` of
//! an [`Outcome`] is the value of qubit `q`.

pub mod exact_cover;
pub mod maxcut;

pub use exact_cover::ExactCover;
pub use maxcut::Graph;

use arvak_varopt::Outcome;

/// A combinatorial problem encoded on qubits.
pub trait Problem {
    /// Stable description of the instance, used as landscape cache key.
    fn identity(&self) -> String;

    /// Number of qubits (binary variables).
    fn num_qubits(&self) -> usize;

    /// Cost of an assignment; QAOA maximizes its expectation.
    fn cost(&self, outcome: Outcome) -> f64;

    /// Cost split into a weight term and a constraint term.
    ///
    /// Interlaced layers apply the two terms with separate angles. Problems
    /// without such a split use the full cost for both.
    fn split_cost(&self, outcome: Outcome) -> (f64, f64) {
        let c = self.cost(outcome);
        (c, c)
    }

    /// Whether an assignment is a valid solution.
    fn is_feasible(&self, _outcome: Outcome) -> bool {
        true
    }

    /// Best feasible assignment and its cost, by enumeration.
    fn brute_force_optimum(&self) -> Option<(Outcome, f64)> {
        (0..1u64 << self.num_qubits())
            .map(Outcome)
            .filter(|&o| self.is_feasible(o))
            .map(|o| (o, self.cost(o)))
            .fold(None, |best, (o, c)| match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((o, c)),
            })
    }
}
