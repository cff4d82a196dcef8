//! Multi-restart local refinement.
//!
//! Every objective evaluation is appended to a [`TrialLedger`]. The result
//! of a refinement is the best ledger entry, never the minimizer's own
//! reported optimum, so noisy re-evaluations or a minimizer that wanders off
//! cannot lose a good trial.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OptError, OptResult, OracleError, Warning};
use crate::optimizers::{Cobyla, NelderMead, OptimizationResult, Optimizer};
use crate::oracle::{Oracle, Shots};
use crate::params::{ParameterBounds, ParameterVector};
use crate::sampler::{AdaptivePrecisionSampler, SamplerConfig};
use crate::stats;

/// One objective evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Position in evaluation order across all restarts.
    pub id: usize,
    /// Parameters actually sent to the oracle.
    pub params: ParameterVector,
    /// Expected cost.
    pub value: f64,
    /// Largest cost observed up to and including this trial.
    pub best_observed: f64,
}

/// Every trial of one refinement call.
#[derive(Debug, Clone, Default)]
pub struct TrialLedger {
    trials: Vec<Trial>,
}

impl TrialLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a trial and return its id.
    pub fn record(&mut self, params: ParameterVector, value: f64, best_observed: f64) -> usize {
        let id = self.trials.len();
        self.trials.push(Trial {
            id,
            params,
            value,
            best_observed,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Trial with the largest value; NaN values are skipped and ties keep
    /// the earliest trial.
    pub fn best(&self) -> Option<&Trial> {
        self.trials
            .iter()
            .filter(|t| !t.value.is_nan())
            .fold(None, |best: Option<&Trial>, t| match best {
                Some(b) if b.value >= t.value => Some(b),
                _ => Some(t),
            })
    }
}

/// Minimizer used for refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum LocalMethod {
    NelderMead(NelderMead),
    Cobyla(Cobyla),
}

impl Default for LocalMethod {
    fn default() -> Self {
        LocalMethod::NelderMead(NelderMead::default())
    }
}

impl LocalMethod {
    fn name(&self) -> &'static str {
        match self {
            LocalMethod::NelderMead(_) => "nelder-mead",
            LocalMethod::Cobyla(_) => "cobyla",
        }
    }

    fn supports_bounds(&self) -> bool {
        match self {
            LocalMethod::NelderMead(m) => m.supports_bounds(),
            LocalMethod::Cobyla(m) => m.supports_bounds(),
        }
    }

    fn minimize<F>(&self, objective: F, start: Vec<f64>, boxes: Vec<(f64, f64)>) -> OptimizationResult
    where
        F: FnMut(&[f64]) -> f64,
    {
        match self {
            LocalMethod::NelderMead(m) => m.minimize(objective, start),
            LocalMethod::Cobyla(m) => m.clone().with_bounds(boxes).minimize(objective, start),
        }
    }
}

/// How each trial is evaluated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum Evaluation {
    /// Backend default shots.
    #[default]
    Default,
    /// A fixed shot count.
    Count(u64),
    /// Exact distribution.
    Exact,
    /// Adaptive-precision sampling.
    Adaptive(SamplerConfig),
}

/// Settings of the local refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub method: LocalMethod,
    /// Number of minimizer runs per refinement.
    pub repeats: usize,
    /// Restart perturbation as a fraction of each class width.
    pub restart_spread: f64,
    /// Base seed of the restart perturbations.
    pub seed: u64,
    pub evaluation: Evaluation,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            method: LocalMethod::default(),
            repeats: 1,
            restart_spread: 0.0,
            seed: 0,
            evaluation: Evaluation::Default,
        }
    }
}

impl LocalConfig {
    pub fn with_method(mut self, method: LocalMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_restart_spread(mut self, spread: f64) -> Self {
        self.restart_spread = spread;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_evaluation(mut self, evaluation: Evaluation) -> Self {
        self.evaluation = evaluation;
        self
    }

    /// Check every setting.
    pub fn validate(&self) -> OptResult<()> {
        if self.repeats == 0 {
            return Err(OptError::InvalidConfiguration(
                "repeats must be at least 1".into(),
            ));
        }
        if !(self.restart_spread.is_finite() && self.restart_spread >= 0.0) {
            return Err(OptError::InvalidConfiguration(format!(
                "restart spread must be non-negative, got {}",
                self.restart_spread
            )));
        }
        match &self.evaluation {
            Evaluation::Count(0) => Err(OptError::InvalidConfiguration(
                "shot count must be at least 1".into(),
            )),
            Evaluation::Adaptive(sampler) => sampler.validate(),
            _ => Ok(()),
        }
    }
}

/// Best trial of a refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalResult {
    /// Parameters of the best trial, inside the domain.
    pub params: ParameterVector,
    /// Expected cost of the best trial.
    pub value: f64,
    /// Negated value.
    pub objective: f64,
    /// Best cost observed up to the best trial.
    pub best_observed: f64,
    /// Oracle evaluations spent.
    pub evaluations: usize,
    /// Warnings raised by adaptive sampling.
    pub warnings: Vec<Warning>,
}

/// Outcome of evaluating one point.
struct Evaluated {
    expectation: f64,
    best_observed: f64,
    warnings: Vec<Warning>,
}

/// Runs a minimizer several times from a seed and keeps the best trial.
#[derive(Debug, Clone)]
pub struct LocalOptimizer {
    config: LocalConfig,
    bounds: ParameterBounds,
    sampler: Option<AdaptivePrecisionSampler>,
}

impl LocalOptimizer {
    /// Create an optimizer; configuration and bounds are validated.
    pub fn new(config: LocalConfig, bounds: ParameterBounds) -> OptResult<Self> {
        config.validate()?;
        bounds.validate()?;
        let sampler = match &config.evaluation {
            Evaluation::Adaptive(cfg) => Some(AdaptivePrecisionSampler::new(cfg.clone())?),
            _ => None,
        };
        Ok(Self {
            config,
            bounds,
            sampler,
        })
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Domain of the refined angles.
    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Starting point of restart `r`.
    fn restart_point(&self, seed: &ParameterVector, r: usize) -> Vec<f64> {
        if r == 0 || self.config.restart_spread == 0.0 {
            return seed.as_slice().to_vec();
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(r as u64));
        let classes = self.bounds.classes();
        seed.as_slice()
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let width = classes[i % classes.len()].width();
                v + rng.gen_range(-1.0..=1.0) * self.config.restart_spread * width
            })
            .collect()
    }

    fn evaluate<O>(&self, oracle: &mut O, params: &ParameterVector) -> Result<Evaluated, OracleError>
    where
        O: Oracle + ?Sized,
    {
        let shots = match &self.config.evaluation {
            Evaluation::Default => Shots::Default,
            Evaluation::Count(n) => Shots::Count(*n),
            Evaluation::Exact => Shots::Exact,
            Evaluation::Adaptive(_) => {
                if let Some(sampler) = &self.sampler {
                    let est = sampler.estimate(oracle, params)?;
                    return Ok(Evaluated {
                        expectation: est.expectation,
                        best_observed: est.best_observed,
                        warnings: est.warnings,
                    });
                }
                Shots::Default
            }
        };
        let dist = oracle.evaluate(params, shots)?;
        let s = stats::reduce(&dist, |o| oracle.cost(o));
        Ok(Evaluated {
            expectation: s.expectation,
            best_observed: s.best_observed,
            warnings: Vec::new(),
        })
    }

    /// Refine `seed` and return the best trial.
    pub fn optimize<O>(&self, oracle: &mut O, seed: &ParameterVector) -> OptResult<LocalResult>
    where
        O: Oracle + ?Sized,
    {
        self.bounds.check(seed)?;
        let depth = seed.depth();
        let classes = seed.classes();
        let fold = !self.config.method.supports_bounds();

        let mut ledger = TrialLedger::new();
        let mut warnings = Vec::new();
        let mut best_observed = f64::NEG_INFINITY;
        let mut failure: Option<OracleError> = None;

        for r in 0..self.config.repeats {
            let start = self.restart_point(seed, r);
            let objective = |x: &[f64]| -> f64 {
                let raw = ParameterVector::from_parts(x.to_vec(), classes);
                let params = if fold { self.bounds.fold(&raw) } else { raw };
                match self.evaluate(oracle, &params) {
                    Ok(eval) if eval.expectation.is_nan() => {
                        failure = Some(OracleError::Malformed(
                            "expectation evaluated to NaN".into(),
                        ));
                        f64::NAN
                    }
                    Ok(eval) => {
                        best_observed = best_observed.max(eval.best_observed);
                        warnings.extend(eval.warnings);
                        let id = ledger.record(params, eval.expectation, best_observed);
                        debug!(
                            trial = id,
                            restart = r,
                            value = eval.expectation,
                            best_observed,
                            "trial"
                        );
                        -eval.expectation
                    }
                    Err(e) => {
                        failure = Some(e);
                        f64::NAN
                    }
                }
            };

            let result = self.config.method.minimize(
                objective,
                start,
                self.bounds.box_constraints(depth),
            );
            debug!(
                depth,
                restart = r,
                method = self.config.method.name(),
                optimum = result.optimal_value,
                iterations = result.num_iterations,
                evaluations = result.num_evaluations,
                converged = result.converged,
                "minimizer finished"
            );

            if let Some(e) = failure.take() {
                return Err(OptError::oracle(depth, e));
            }
        }

        let best = ledger.best().ok_or_else(|| {
            OptError::oracle(depth, OracleError::Malformed("no trial was evaluated".into()))
        })?;
        Ok(LocalResult {
            params: best.params.clone(),
            value: best.value,
            objective: -best.value,
            best_observed: best.best_observed,
            evaluations: ledger.len(),
            warnings,
        })
    }
}
