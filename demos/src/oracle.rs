//! Local statevector backend.
//!
//! [`StatevectorOracle`] answers every request by simulating the QAOA
//! circuit exactly. Finite shot counts are drawn from the exact
//! distribution with a seeded generator, so runs are reproducible.

use anyhow::{Result, ensure};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::trace;

use arvak_varopt::{Oracle, OracleError, Outcome, OutcomeDistribution, ParameterVector, Shots};

use crate::circuits::{CostDiagonals, probabilities, qaoa_state};
use crate::problems::Problem;

/// Largest simulated register.
pub const MAX_QUBITS: usize = 20;

/// Exact simulator of QAOA circuits for one problem instance.
pub struct StatevectorOracle<P: Problem> {
    problem: P,
    costs: CostDiagonals,
    default_shots: Option<u64>,
    rng: StdRng,
    circuits: usize,
}

impl<P: Problem> StatevectorOracle<P> {
    /// Create an oracle for a problem.
    pub fn new(problem: P) -> Result<Self> {
        let n = problem.num_qubits();
        ensure!(
            (1..=MAX_QUBITS).contains(&n),
            "statevector simulation supports 1 to {} qubits, problem has {}",
            MAX_QUBITS,
            n
        );
        let costs = CostDiagonals::from_problem(&problem);
        Ok(Self {
            problem,
            costs,
            default_shots: None,
            rng: StdRng::seed_from_u64(0),
            circuits: 0,
        })
    }

    /// Sample this many shots when the caller asks for the backend default.
    ///
    /// Without it the default is the exact distribution.
    pub fn with_default_shots(mut self, shots: u64) -> Self {
        self.default_shots = Some(shots);
        self
    }

    /// Seed the shot sampler.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The simulated problem.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Number of circuits simulated so far.
    pub fn circuits_run(&self) -> usize {
        self.circuits
    }
}

impl<P: Problem> Oracle for StatevectorOracle<P> {
    fn evaluate(
        &mut self,
        params: &ParameterVector,
        shots: Shots,
    ) -> Result<OutcomeDistribution, OracleError> {
        if !matches!(params.classes(), 2 | 3) {
            return Err(OracleError::InvalidParameters(format!(
                "QAOA layers take 2 or 3 angles, got {}",
                params.classes()
            )));
        }
        if params.as_slice().iter().any(|v| !v.is_finite()) {
            return Err(OracleError::InvalidParameters(format!(
                "non-finite angle in {}",
                params
            )));
        }

        self.circuits += 1;
        trace!(depth = params.depth(), "simulating circuit");
        let exact = OutcomeDistribution::from_probabilities(&probabilities(&qaoa_state(
            &self.costs,
            params,
        )))?;

        match (shots, self.default_shots) {
            (Shots::Exact, _) | (Shots::Default, None) => Ok(exact),
            (Shots::Count(n), _) | (Shots::Default, Some(n)) => exact.sample(n, &mut self.rng),
        }
    }

    fn cost(&self, outcome: Outcome) -> f64 {
        self.problem.cost(outcome)
    }

    fn is_feasible(&self, outcome: Outcome) -> bool {
        self.problem.is_feasible(outcome)
    }

    fn identity(&self) -> Option<String> {
        Some(self.problem.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::{ExactCover, Graph};
    use approx::assert_abs_diff_eq;
    use arvak_varopt::stats;

    #[test]
    fn test_exact_distribution_at_zero_angles() {
        let mut oracle = StatevectorOracle::new(Graph::square_4()).unwrap();
        let x = ParameterVector::new(vec![0.0, 0.0], 2).unwrap();
        let dist = oracle.evaluate(&x, Shots::Default).unwrap();
        assert!(dist.is_exact());
        assert_eq!(dist.len(), 16);
        let s = stats::reduce(&dist, |o| oracle.cost(o));
        assert_abs_diff_eq!(s.expectation, 2.0, epsilon = 1e-12);
        assert_eq!(s.best_observed, 4.0);
        assert_eq!(oracle.circuits_run(), 1);
    }

    #[test]
    fn test_sampled_shots_are_reproducible() {
        let x = ParameterVector::new(vec![0.4, 0.3], 2).unwrap();
        let mut a = StatevectorOracle::new(Graph::ring_6()).unwrap().with_seed(3);
        let mut b = StatevectorOracle::new(Graph::ring_6()).unwrap().with_seed(3);
        let da = a.evaluate(&x, Shots::Count(256)).unwrap();
        let db = b.evaluate(&x, Shots::Count(256)).unwrap();
        assert_eq!(da.shots(), Some(256));
        assert_eq!(da, db);
    }

    #[test]
    fn test_default_shots() {
        let x = ParameterVector::new(vec![0.4, 0.3], 2).unwrap();
        let mut oracle = StatevectorOracle::new(Graph::square_4())
            .unwrap()
            .with_default_shots(100);
        assert_eq!(oracle.evaluate(&x, Shots::Default).unwrap().shots(), Some(100));
        assert!(oracle.evaluate(&x, Shots::Exact).unwrap().is_exact());
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let mut oracle = StatevectorOracle::new(Graph::square_4()).unwrap();
        let x = ParameterVector::new(vec![0.1, 0.2, 0.3, 0.4], 4).unwrap();
        assert!(matches!(
            oracle.evaluate(&x, Shots::Exact),
            Err(OracleError::InvalidParameters(_))
        ));
        let x = ParameterVector::new(vec![f64::NAN, 0.2], 2).unwrap();
        assert!(oracle.evaluate(&x, Shots::Exact).is_err());
    }

    #[test]
    fn test_rejects_empty_problem() {
        assert!(StatevectorOracle::new(Graph::new(0)).is_err());
    }

    #[test]
    fn test_interlaced_feasibility_and_identity() {
        let mut oracle = StatevectorOracle::new(ExactCover::small_instance()).unwrap();
        assert!(oracle.is_feasible(Outcome(0b01100)));
        assert!(oracle.identity().unwrap().starts_with("exact-cover/"));
        let x = ParameterVector::new(vec![0.2, 0.3, 0.1], 3).unwrap();
        let dist = oracle.evaluate(&x, Shots::Exact).unwrap();
        let mass: f64 = dist.iter().map(|(_, p)| p).sum();
        assert_abs_diff_eq!(mass, 1.0, epsilon = 1e-9);
    }
}
