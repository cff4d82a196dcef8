//! Depth-incremental optimization schedule.
//!
//! ```text
//! scan (depth 1) -> refine -> [check] -> interp -> refine -> ... -> done
//! ```
//!
//! The depth-1 seed comes from the landscape minimum, every deeper seed
//! from INTERP of the previous depth's refined parameters, with periodic
//! angles unwrapped across layers first.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::SchedulerConfig;
use crate::error::{OptError, OptResult, ScheduleError, Warning};
use crate::interp::interp_within;
use crate::landscape::{Landscape, LandscapeScanner};
use crate::local::LocalOptimizer;
use crate::oracle::{Oracle, Shots};
use crate::outcome::Outcome;
use crate::params::ParameterVector;
use crate::stats;

/// Result of one depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthRecord {
    pub depth: usize,
    /// Seed of the refinement.
    pub x0: ParameterVector,
    /// Refined parameters.
    pub x_l: ParameterVector,
    /// Expected cost at `x_l`.
    pub value: f64,
    /// `-value`.
    pub objective: f64,
    pub best_observed: f64,
    /// Oracle evaluations spent on refinement.
    pub evaluations: usize,
    /// Feasible mass at `x_l`, when a stopping criterion is set.
    pub success_probability: Option<f64>,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// All depths were optimized.
    MaxDepth,
    /// The success threshold was reached.
    Converged { depth: usize },
}

/// Completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub landscape: Landscape,
    pub records: Vec<DepthRecord>,
    pub termination: Termination,
    pub warnings: Vec<Warning>,
}

impl Schedule {
    /// Record of a given depth.
    pub fn record(&self, depth: usize) -> Option<&DepthRecord> {
        self.records.iter().find(|r| r.depth == depth)
    }

    /// Record with the largest value.
    pub fn best(&self) -> Option<&DepthRecord> {
        self.records
            .iter()
            .filter(|r| !r.value.is_nan())
            .max_by(|a, b| a.value.total_cmp(&b.value))
    }

    /// Deepest optimized depth.
    pub fn final_depth(&self) -> usize {
        self.records.last().map_or(0, |r| r.depth)
    }
}

/// Runs scan, refinement and extrapolation over increasing depth.
#[derive(Debug, Clone)]
pub struct OptimizationScheduler {
    config: SchedulerConfig,
    scanner: LandscapeScanner,
    local: LocalOptimizer,
}

impl OptimizationScheduler {
    /// Create a scheduler; the whole configuration is validated up front.
    pub fn new(config: SchedulerConfig) -> OptResult<Self> {
        config.validate()?;
        let mut scanner =
            LandscapeScanner::new(config.grid.clone())?.with_shots(config.landscape_shots);
        if let Some(cache) = config.cache.resolve() {
            scanner = scanner.with_cache(cache);
        }
        let local = LocalOptimizer::new(config.local.clone(), config.grid.bounds.clone())?;
        Ok(Self {
            config,
            scanner,
            local,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Optimize depths `1..=max_depth`, or until the stopping criterion holds.
    pub fn run<O>(&self, oracle: &mut O) -> Result<Schedule, ScheduleError>
    where
        O: Oracle + ?Sized,
    {
        info!(
            max_depth = self.config.max_depth,
            classes = self.config.grid.bounds.num_classes(),
            "starting depth schedule"
        );

        let landscape = self.scanner.scan(oracle).map_err(|e| ScheduleError {
            depth: 1,
            completed: Vec::new(),
            landscape: None,
            source: OptError::oracle(1, e),
        })?;

        let mut seed = Some(landscape.best_point());
        let mut records: Vec<DepthRecord> = Vec::with_capacity(self.config.max_depth);
        let mut warnings = Vec::new();
        let mut termination = Termination::MaxDepth;

        for depth in 1..=self.config.max_depth {
            let Some(x0) = seed.take() else { break };
            let (record, depth_warnings) = match self.refine_depth(oracle, depth, x0) {
                Ok(step) => step,
                Err(source) => {
                    return Err(ScheduleError {
                        depth,
                        completed: records,
                        landscape: Some(landscape),
                        source,
                    });
                }
            };
            warnings.extend(depth_warnings);

            let reached = match (record.success_probability, &self.config.stopping) {
                (Some(p), Some(stop)) => p >= stop.success_threshold,
                _ => false,
            };
            if depth < self.config.max_depth {
                seed = Some(interp_within(&record.x_l, &self.config.grid.bounds));
            }
            records.push(record);

            if reached {
                info!(depth, "success threshold reached");
                termination = Termination::Converged { depth };
                break;
            }
        }

        Ok(Schedule {
            landscape,
            records,
            termination,
            warnings,
        })
    }

    #[instrument(skip_all, fields(depth = depth))]
    fn refine_depth<O>(
        &self,
        oracle: &mut O,
        depth: usize,
        x0: ParameterVector,
    ) -> OptResult<(DepthRecord, Vec<Warning>)>
    where
        O: Oracle + ?Sized,
    {
        info!(seed = %x0, "refining");
        let result = self.local.optimize(oracle, &x0)?;

        let success_probability = if self.config.stopping.is_some() {
            let dist = oracle
                .evaluate(&result.params, Shots::Exact)
                .map_err(|e| OptError::oracle(depth, e))?;
            Some(stats::success_probability(&dist, |o| oracle.is_feasible(o)))
        } else {
            None
        };

        info!(
            value = result.value,
            best_observed = result.best_observed,
            evaluations = result.evaluations,
            success_probability,
            params = %result.params,
            "depth done"
        );

        let record = DepthRecord {
            depth,
            x0,
            x_l: result.params,
            value: result.value,
            objective: result.objective,
            best_observed: result.best_observed,
            evaluations: result.evaluations,
            success_probability,
        };
        Ok((record, result.warnings))
    }
}

/// Exact-mode statistics of a refined depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthStatistics {
    pub depth: usize,
    /// Expected cost.
    pub expectation: f64,
    /// Feasible probability mass.
    pub success_probability: f64,
    /// Largest cost among outcomes with positive probability.
    pub best_cost: f64,
    /// Smallest outcome attaining `best_cost`.
    pub best_outcome: Option<Outcome>,
    /// Probability mass of all outcomes attaining `best_cost`.
    pub best_probability: f64,
    /// Most probable outcome; ties keep the smallest.
    pub most_likely: Option<Outcome>,
    /// Cost of `most_likely`.
    pub most_likely_cost: Option<f64>,
    /// Probability of `most_likely`.
    pub most_likely_probability: f64,
}

/// Re-evaluate each record's refined parameters exactly.
pub fn depth_statistics<O>(oracle: &mut O, records: &[DepthRecord]) -> OptResult<Vec<DepthStatistics>>
where
    O: Oracle + ?Sized,
{
    records
        .iter()
        .map(|record| {
            let dist = oracle
                .evaluate(&record.x_l, Shots::Exact)
                .map_err(|e| OptError::oracle(record.depth, e))?;
            let s = stats::reduce(&dist, |o| oracle.cost(o));
            let success_probability = stats::success_probability(&dist, |o| oracle.is_feasible(o));

            let tolerance = 1e-9 * (1.0 + s.best_observed.abs());
            let mut best_outcome: Option<Outcome> = None;
            let mut best_probability = 0.0;
            let mut most_likely: Option<(Outcome, f64)> = None;
            for (outcome, p) in dist.iter() {
                if (oracle.cost(outcome) - s.best_observed).abs() <= tolerance {
                    best_probability += p;
                    if best_outcome.is_none_or(|b| outcome < b) {
                        best_outcome = Some(outcome);
                    }
                }
                let replace = match most_likely {
                    None => true,
                    Some((o, q)) => p > q || (p == q && outcome < o),
                };
                if replace {
                    most_likely = Some((outcome, p));
                }
            }

            Ok(DepthStatistics {
                depth: record.depth,
                expectation: s.expectation,
                success_probability,
                best_cost: s.best_observed,
                best_outcome,
                best_probability,
                most_likely: most_likely.map(|(o, _)| o),
                most_likely_cost: most_likely.map(|(o, _)| oracle.cost(o)),
                most_likely_probability: most_likely.map_or(0.0, |(_, p)| p),
            })
        })
        .collect()
}
