//! The evaluation backend seen by the optimizer.
//!
//! An [`Oracle`] hides circuit construction and execution for one problem
//! variant. The optimizer only ever asks it for outcome distributions and
//! for the cost of an outcome.

use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::outcome::{Outcome, OutcomeDistribution};
use crate::params::ParameterVector;

/// How many shots to request from an oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shots {
    /// Whatever the backend does by default.
    #[default]
    Default,
    /// An exact distribution (statevector backends).
    Exact,
    /// A fixed number of samples.
    Count(u64),
}

/// Problem-specific evaluator of layered circuits.
///
/// Calls block until the backend answers. Repeated calls with the same
/// parameters may return different samples but must share one underlying
/// exact distribution.
pub trait Oracle {
    /// Run the circuit of depth `params.depth()` and return its outcomes.
    fn evaluate(
        &mut self,
        params: &ParameterVector,
        shots: Shots,
    ) -> Result<OutcomeDistribution, OracleError>;

    /// Run many circuits as one logical request.
    ///
    /// Backends that can batch should override this.
    fn evaluate_batch(
        &mut self,
        params: &[ParameterVector],
        shots: Shots,
    ) -> Result<Vec<OutcomeDistribution>, OracleError> {
        params.iter().map(|p| self.evaluate(p, shots)).collect()
    }

    /// Cost of an outcome; the optimizer maximizes its expectation.
    fn cost(&self, outcome: Outcome) -> f64;

    /// Whether an outcome is a valid solution of the problem.
    fn is_feasible(&self, _outcome: Outcome) -> bool {
        true
    }

    /// Stable identity of the problem instance, used as landscape cache key.
    fn identity(&self) -> Option<String> {
        None
    }
}

impl<O: Oracle + ?Sized> Oracle for &mut O {
    fn evaluate(
        &mut self,
        params: &ParameterVector,
        shots: Shots,
    ) -> Result<OutcomeDistribution, OracleError> {
        (**self).evaluate(params, shots)
    }

    fn evaluate_batch(
        &mut self,
        params: &[ParameterVector],
        shots: Shots,
    ) -> Result<Vec<OutcomeDistribution>, OracleError> {
        (**self).evaluate_batch(params, shots)
    }

    fn cost(&self, outcome: Outcome) -> f64 {
        (**self).cost(outcome)
    }

    fn is_feasible(&self, outcome: Outcome) -> bool {
        (**self).is_feasible(outcome)
    }

    fn identity(&self) -> Option<String> {
        (**self).identity()
    }
}
