//! Arvak depth-incremental variational optimizer.
//!
//! This crate finds the angles of layered QAOA-style circuits one depth at a
//! time: a grid scan of the depth-1 energy landscape, multi-restart local
//! refinement at every depth, and INTERP extrapolation of the refined angles
//! to seed the next depth. Circuit construction and execution stay behind the
//! [`Oracle`] trait.
//!
//! # Features
//!
//! - **Landscape scan**: one batched oracle request over a bounded grid,
//!   optionally cached on disk per problem instance
//! - **Local refinement**: Nelder-Mead or COBYLA with restarts; the best
//!   evaluated trial is kept, not the minimizer's own answer
//! - **Adaptive sampling**: shots are added until a confidence interval is
//!   narrow enough, with a hard cap
//! - **Interlaced layers**: two (gamma, beta) or three (gamma, beta, delta)
//!   angle classes per layer
//!
//! # Example
//!
//! ```ignore
//! use arvak_varopt::{GridSpec, OptimizationScheduler, SchedulerConfig};
//!
//! let config = SchedulerConfig::default()
//!     .with_max_depth(4)
//!     .with_grid(GridSpec::standard(24, 12));
//! let scheduler = OptimizationScheduler::new(config)?;
//! let schedule = scheduler.run(&mut oracle)?;
//!
//! for record in &schedule.records {
//!     println!("p={} <C>={:.4} x={}", record.depth, record.value, record.x_l);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod interp;
pub mod landscape;
pub mod local;
pub mod optimizers;
pub mod oracle;
pub mod outcome;
pub mod params;
pub mod sampler;
pub mod scheduler;
pub mod stats;

// Re-exports
pub use cache::LandscapeCache;
pub use config::{CacheSetting, SchedulerConfig, StoppingCriterion};
pub use error::{OptError, OptResult, OracleError, ScheduleError, Warning};
pub use interp::{interp, interp_layers, interp_within};
pub use landscape::{GridSpec, Landscape, LandscapeScanner};
pub use local::{
    Evaluation, LocalConfig, LocalMethod, LocalOptimizer, LocalResult, Trial, TrialLedger,
};
pub use optimizers::{Cobyla, NelderMead, OptimizationResult, Optimizer};
pub use oracle::{Oracle, Shots};
pub use outcome::{Outcome, OutcomeDistribution};
pub use params::{AngleClass, ParameterBounds, ParameterVector};
pub use sampler::{AdaptivePrecisionSampler, Estimate, SamplerConfig, SamplingHistory, Tolerance};
pub use scheduler::{
    DepthRecord, DepthStatistics, OptimizationScheduler, Schedule, Termination, depth_statistics,
};
pub use stats::{Statistics, StatisticsReducer};
