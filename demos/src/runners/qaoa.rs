//! QAOA runner.
//!
//! Wires a problem to the statevector oracle and runs the depth-incremental
//! schedule: landscape scan at p = 1, local refinement at every depth and
//! INTERP seeding of the next one.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use arvak_varopt::{
    CacheSetting, DepthStatistics, Evaluation, GridSpec, LocalMethod, OptimizationScheduler,
    Outcome, ParameterBounds, SamplerConfig, Schedule, SchedulerConfig, depth_statistics,
};

use crate::oracle::StatevectorOracle;
use crate::problems::Problem;

/// Result of a QAOA run.
#[derive(Debug, Clone, Serialize)]
pub struct QaoaResult {
    /// Per-depth records of the optimizer.
    pub schedule: Schedule,
    /// Exact statistics at each refined depth.
    pub statistics: Vec<DepthStatistics>,
    /// Best feasible assignment and its cost, by enumeration.
    pub optimum: Option<(Outcome, f64)>,
    /// Circuits simulated in total.
    pub circuit_evaluations: usize,
}

impl QaoaResult {
    /// Expected cost over optimal cost at a depth.
    ///
    /// Only defined when the optimal cost is positive.
    pub fn approximation_ratio(&self, depth: usize) -> Option<f64> {
        let (_, optimum) = self.optimum?;
        let record = self.schedule.record(depth)?;
        (optimum > 0.0).then(|| record.value / optimum)
    }

    /// Statistics of the deepest refined depth.
    pub fn final_statistics(&self) -> Option<&DepthStatistics> {
        self.statistics.last()
    }

    /// Whether the most probable outcome of the final depth is an optimal
    /// assignment.
    pub fn found_optimum(&self) -> bool {
        let most_likely = self.final_statistics().and_then(|s| s.most_likely_cost);
        match (self.optimum, most_likely) {
            (Some((_, optimum)), Some(cost)) => (cost - optimum).abs() < 1e-9,
            _ => false,
        }
    }
}

/// QAOA runner configuration.
pub struct QaoaRunner<P: Problem> {
    /// The problem to optimize.
    pub problem: P,
    /// Scheduler settings.
    pub config: SchedulerConfig,
    /// Samples per evaluation; exact distributions when `None`.
    pub shots: Option<u64>,
    /// Seed of the shot sampler.
    pub seed: u64,
}

impl<P: Problem + Clone> QaoaRunner<P> {
    /// Create a runner with the default schedule.
    pub fn new(problem: P) -> Self {
        Self {
            problem,
            config: SchedulerConfig::default(),
            shots: None,
            seed: 0,
        }
    }

    /// Replace the whole scheduler configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the largest depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the landscape resolution; interlaced grids reuse `gamma_points` for delta.
    pub fn with_grid_resolution(mut self, gamma_points: usize, beta_points: usize) -> Self {
        let interlaced = self.is_interlaced();
        self.config.grid = grid(interlaced, gamma_points, beta_points);
        self
    }

    /// Use three angle classes per layer.
    pub fn with_interlaced(mut self, interlaced: bool) -> Self {
        let res = &self.config.grid.resolution;
        let (g, b) = (res.first().copied().unwrap_or(20), res.get(1).copied().unwrap_or(10));
        self.config.grid = grid(interlaced, g, b);
        self
    }

    /// Set restarts per refinement and their spread.
    pub fn with_repeats(mut self, repeats: usize, spread: f64) -> Self {
        self.config.local.repeats = repeats;
        self.config.local.restart_spread = spread;
        self
    }

    /// Set the local minimizer.
    pub fn with_method(mut self, method: LocalMethod) -> Self {
        self.config.local.method = method;
        self
    }

    /// Sample this many shots per evaluation.
    pub fn with_shots(mut self, shots: Option<u64>) -> Self {
        self.shots = shots;
        self
    }

    /// Refine with adaptive-precision sampling.
    pub fn with_adaptive(mut self, sampler: SamplerConfig) -> Self {
        self.config.local.evaluation = Evaluation::Adaptive(sampler);
        self
    }

    /// Seed restarts and shot sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.config.local.seed = seed;
        self
    }

    /// Stop once the success probability reaches `threshold`.
    pub fn with_stopping(mut self, threshold: f64) -> Self {
        self.config = self.config.with_stopping(threshold);
        self
    }

    /// Set the landscape cache.
    pub fn with_cache(mut self, cache: CacheSetting) -> Self {
        self.config.cache = cache;
        self
    }

    /// Whether layers carry three angle classes.
    pub fn is_interlaced(&self) -> bool {
        self.config.grid.bounds.num_classes() == 3
    }

    /// Run the schedule and collect exact statistics per depth.
    pub fn run(&self) -> Result<QaoaResult> {
        let mut oracle = StatevectorOracle::new(self.problem.clone())?.with_seed(self.seed);
        if let Some(shots) = self.shots {
            oracle = oracle.with_default_shots(shots);
        }

        let scheduler =
            OptimizationScheduler::new(self.config.clone()).context("invalid QAOA configuration")?;
        info!(
            qubits = self.problem.num_qubits(),
            max_depth = self.config.max_depth,
            interlaced = self.is_interlaced(),
            "running QAOA"
        );
        let schedule = scheduler
            .run(&mut oracle)
            .context("QAOA optimization failed")?;
        let statistics = depth_statistics(&mut oracle, &schedule.records)
            .context("failed to evaluate refined angles")?;

        Ok(QaoaResult {
            schedule,
            statistics,
            optimum: self.problem.brute_force_optimum(),
            circuit_evaluations: oracle.circuits_run(),
        })
    }
}

fn grid(interlaced: bool, gamma_points: usize, beta_points: usize) -> GridSpec {
    if interlaced {
        GridSpec::new(
            ParameterBounds::interlaced(),
            vec![gamma_points, beta_points, gamma_points],
        )
    } else {
        GridSpec::standard(gamma_points, beta_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::{ExactCover, Graph};
    use arvak_varopt::{NelderMead, Termination};

    #[test]
    fn test_square_reaches_good_ratio() {
        let result = QaoaRunner::new(Graph::square_4())
            .with_max_depth(2)
            .with_grid_resolution(12, 6)
            .run()
            .unwrap();
        assert_eq!(result.schedule.records.len(), 2);
        assert_eq!(result.optimum.unwrap().1, 4.0);
        // p = 1 on a 4-cycle reaches 3/4 of the maximum cut
        let r1 = result.approximation_ratio(1).unwrap();
        assert!(r1 > 0.7, "ratio at p=1: {}", r1);
        let r2 = result.approximation_ratio(2).unwrap();
        assert!(r2 > 0.7, "ratio at p=2: {}", r2);
        assert!(result.found_optimum());
        assert!(result.circuit_evaluations > 72);
    }

    #[test]
    fn test_found_optimum_uses_most_likely_outcome() {
        let mut result = QaoaRunner::new(Graph::square_4())
            .with_max_depth(1)
            .with_grid_resolution(6, 4)
            .run()
            .unwrap();
        let last = result.statistics.last_mut().unwrap();
        // an optimal cut with some probability is not enough
        last.best_cost = 4.0;
        last.most_likely = Some(Outcome(0));
        last.most_likely_cost = Some(0.0);
        assert!(!result.found_optimum());

        let last = result.statistics.last_mut().unwrap();
        last.most_likely = Some(Outcome(0b0101));
        last.most_likely_cost = Some(4.0);
        assert!(result.found_optimum());
    }

    #[test]
    fn test_interlaced_grid_shape() {
        let runner = QaoaRunner::new(ExactCover::small_instance())
            .with_grid_resolution(6, 4)
            .with_interlaced(true);
        assert!(runner.is_interlaced());
        assert_eq!(runner.config.grid.resolution, vec![6, 4, 6]);
        let runner = runner.with_interlaced(false);
        assert_eq!(runner.config.grid.resolution, vec![6, 4]);
    }

    #[test]
    fn test_exact_cover_interlaced_run() {
        let result = QaoaRunner::new(ExactCover::small_instance())
            .with_max_depth(2)
            .with_grid_resolution(5, 4)
            .with_interlaced(true)
            .with_method(LocalMethod::NelderMead(NelderMead::default().with_max_evaluations(200)))
            .run()
            .unwrap();
        assert_eq!(result.schedule.termination, Termination::MaxDepth);
        assert_eq!(result.statistics.len(), 2);
        for s in &result.statistics {
            assert!((0.0..=1.0 + 1e-9).contains(&s.success_probability));
        }
        // costs are negative, so no ratio
        assert!(result.approximation_ratio(1).is_none());
    }

    #[test]
    fn test_invalid_configuration_is_reported() {
        let err = QaoaRunner::new(Graph::square_4())
            .with_max_depth(0)
            .run()
            .unwrap_err();
        assert!(format!("{:#}", err).contains("max depth"));
    }

    #[test]
    fn test_cached_landscape_skips_scan() {
        let dir = tempfile::tempdir().unwrap();
        let runner = QaoaRunner::new(Graph::square_4())
            .with_max_depth(1)
            .with_grid_resolution(8, 4)
            .with_cache(CacheSetting::Directory(dir.path().to_path_buf()));
        let first = runner.run().unwrap();
        let second = runner.run().unwrap();
        assert_eq!(first.schedule.landscape, second.schedule.landscape);
        assert_eq!(first.circuit_evaluations - second.circuit_evaluations, 32);
    }

    #[test]
    fn test_sampled_run_is_reproducible() {
        let run = || {
            QaoaRunner::new(Graph::square_4())
                .with_max_depth(1)
                .with_grid_resolution(6, 4)
                .with_shots(Some(200))
                .with_seed(11)
                .run()
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.schedule.records, b.schedule.records);
    }
}
