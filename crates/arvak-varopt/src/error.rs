//! Error types for the variational optimizer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::landscape::Landscape;
use crate::scheduler::DepthRecord;

/// Result type for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

/// Errors raised by the optimizer components.
#[derive(Debug, Error)]
pub enum OptError {
    /// Bounds of an angle class are empty or not finite.
    #[error("invalid bounds for angle class '{class}': lower {lower} must be below upper {upper}")]
    InvalidBounds {
        class: String,
        lower: f64,
        upper: f64,
    },

    /// A grid axis has no points.
    #[error("grid resolution must be positive (axis {axis} has {points} points)")]
    InvalidResolution { axis: usize, points: usize },

    /// Parameter vector length does not fit depth and angle classes.
    #[error("parameter vector of length {len} does not fit depth {depth} x {classes} angle classes")]
    LengthMismatch {
        len: usize,
        depth: usize,
        classes: usize,
    },

    /// Any other rejected setting.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The oracle failed while evaluating parameters at some depth.
    #[error("oracle failed at depth {depth}: {source}")]
    OracleFailure {
        depth: usize,
        #[source]
        source: OracleError,
    },
}

impl OptError {
    /// Whether this error was raised while validating configuration.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, OptError::OracleFailure { .. })
    }

    pub(crate) fn oracle(depth: usize, source: OracleError) -> Self {
        OptError::OracleFailure { depth, source }
    }
}

/// Errors reported by an [`Oracle`](crate::oracle::Oracle) implementation.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The backend could not be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer in time.
    #[error("backend timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The backend answered with something that is not a distribution.
    #[error("malformed result: {0}")]
    Malformed(String),

    /// Parameters the backend cannot execute.
    #[error("invalid circuit parameters: {0}")]
    InvalidParameters(String),

    /// Any other backend error.
    #[error(transparent)]
    Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A scheduler run aborted part way.
///
/// Records of the depths that finished before the failure are kept.
#[derive(Debug, Error)]
#[error("optimization aborted at depth {depth}: {source}")]
pub struct ScheduleError {
    /// Depth that was being processed.
    pub depth: usize,
    /// Records of all depths that completed.
    pub completed: Vec<DepthRecord>,
    /// Depth-1 landscape, if the scan finished.
    pub landscape: Option<Landscape>,
    /// Cause of the abort.
    #[source]
    pub source: OptError,
}

/// Non-fatal conditions surfaced next to usable results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The shot cap was reached before the requested precision.
    PrecisionUnattainable { required: u64, max_shots: u64 },
    /// A variance estimate came out negative or NaN and was clamped to zero.
    NumericDegeneracy { raw_variance: f64 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::PrecisionUnattainable {
                required,
                max_shots,
            } => write!(
                f,
                "precision unattainable: {} shots required, capped at {}",
                required, max_shots
            ),
            Warning::NumericDegeneracy { raw_variance } => {
                write!(f, "variance {} clamped to zero", raw_variance)
            }
        }
    }
}
