//! Scheduler configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cache::LandscapeCache;
use crate::error::{OptError, OptResult};
use crate::landscape::GridSpec;
use crate::local::LocalConfig;
use crate::oracle::Shots;

/// Where depth-1 landscapes are cached.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSetting {
    /// Always scan.
    #[default]
    Disabled,
    /// The user cache directory.
    UserCache,
    /// A given directory.
    Directory(PathBuf),
}

impl CacheSetting {
    /// The cache to use, if any.
    pub fn resolve(&self) -> Option<LandscapeCache> {
        match self {
            CacheSetting::Disabled => None,
            CacheSetting::UserCache => LandscapeCache::default_location(),
            CacheSetting::Directory(dir) => Some(LandscapeCache::new(dir.clone())),
        }
    }
}

/// Stop early once the feasible mass at the refined parameters is high enough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoppingCriterion {
    /// Success probability that ends the run, in `(0, 1]`.
    pub success_threshold: f64,
}

impl StoppingCriterion {
    pub fn new(success_threshold: f64) -> Self {
        Self { success_threshold }
    }
}

/// Configuration of a full optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Largest depth to optimize.
    pub max_depth: usize,
    /// Depth-1 landscape grid.
    pub grid: GridSpec,
    /// Shots per landscape point.
    pub landscape_shots: Shots,
    /// Local refinement settings.
    pub local: LocalConfig,
    /// Optional early stop.
    pub stopping: Option<StoppingCriterion>,
    /// Landscape cache.
    pub cache: CacheSetting,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            grid: GridSpec::standard(20, 10),
            landscape_shots: Shots::Default,
            local: LocalConfig::default(),
            stopping: None,
            cache: CacheSetting::Disabled,
        }
    }
}

impl SchedulerConfig {
    /// Set the largest depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the landscape grid.
    pub fn with_grid(mut self, grid: GridSpec) -> Self {
        self.grid = grid;
        self
    }

    /// Set the shots per landscape point.
    pub fn with_landscape_shots(mut self, shots: Shots) -> Self {
        self.landscape_shots = shots;
        self
    }

    /// Set the local refinement settings.
    pub fn with_local(mut self, local: LocalConfig) -> Self {
        self.local = local;
        self
    }

    /// Stop once the success probability reaches `threshold`.
    pub fn with_stopping(mut self, threshold: f64) -> Self {
        self.stopping = Some(StoppingCriterion::new(threshold));
        self
    }

    /// Set the landscape cache.
    pub fn with_cache(mut self, cache: CacheSetting) -> Self {
        self.cache = cache;
        self
    }

    /// Check every setting.
    pub fn validate(&self) -> OptResult<()> {
        if self.max_depth == 0 {
            return Err(OptError::InvalidConfiguration(
                "max depth must be at least 1".into(),
            ));
        }
        self.grid.validate()?;
        self.local.validate()?;
        if let Shots::Count(0) = self.landscape_shots {
            return Err(OptError::InvalidConfiguration(
                "landscape shot count must be at least 1".into(),
            ));
        }
        if let Some(stop) = &self.stopping {
            let t = stop.success_threshold;
            if !(t > 0.0 && t <= 1.0) {
                return Err(OptError::InvalidConfiguration(format!(
                    "success threshold must lie in (0, 1], got {}",
                    t
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::Evaluation;
    use crate::sampler::SamplerConfig;

    #[test]
    fn test_default_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(SchedulerConfig::default().with_max_depth(0).validate().is_err());
        assert!(SchedulerConfig::default().with_stopping(1.5).validate().is_err());
        assert!(
            SchedulerConfig::default()
                .with_grid(GridSpec::standard(0, 3))
                .validate()
                .is_err()
        );
        assert!(
            SchedulerConfig::default()
                .with_local(LocalConfig::default().with_evaluation(Evaluation::Adaptive(
                    SamplerConfig::default().with_initial_shots(0)
                )))
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: SchedulerConfig =
            serde_json::from_str(r#"{"max_depth": 5, "local": {"repeats": 4}}"#).unwrap();
        assert_eq!(cfg.max_depth, 5);
        assert_eq!(cfg.local.repeats, 4);
        assert_eq!(cfg.grid, GridSpec::standard(20, 10));
        assert_eq!(cfg.cache, CacheSetting::Disabled);
    }

    #[test]
    fn test_cache_setting_resolves() {
        assert!(CacheSetting::Disabled.resolve().is_none());
        let dir = CacheSetting::Directory("/tmp/landscapes".into()).resolve().unwrap();
        assert_eq!(dir.dir(), std::path::Path::new("/tmp/landscapes"));
    }
}
