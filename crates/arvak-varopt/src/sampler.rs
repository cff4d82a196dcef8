//! Adaptive-precision sampling.
//!
//! The sampler queries an oracle in growing batches of shots until the
//! number of shots consumed covers the number required by the current
//! variance estimate,
//!
//! ```text
//! n_req = ceil(z² · σ² / ε²)
//! ```
//!
//! and the variance estimate has settled. Batches are merged with the
//! pooled mean/variance update, so no raw samples are kept.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{OptError, OptResult, OracleError, Warning};
use crate::oracle::{Oracle, Shots};
use crate::params::ParameterVector;
use crate::stats::{StatisticsReducer, clamp_variance};

/// Target half-width of the confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Tolerance {
    /// Fixed half-width.
    Absolute(f64),
    /// Half-width relative to the magnitude of the running expectation.
    Relative(f64),
}

impl Tolerance {
    /// Absolute half-width for a given expectation.
    pub fn absolute(&self, expectation: f64) -> f64 {
        match *self {
            Tolerance::Absolute(t) => t,
            Tolerance::Relative(r) => r * expectation.abs(),
        }
    }

    fn value(&self) -> f64 {
        match *self {
            Tolerance::Absolute(t) | Tolerance::Relative(t) => t,
        }
    }
}

/// Settings of the adaptive sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Normal quantile of the confidence level (1.96 for 95 %).
    pub confidence: f64,
    /// Precision target.
    pub tolerance: Tolerance,
    /// Largest relative change of the variance still considered settled.
    pub variance_change: f64,
    /// Shots of the first batch.
    pub initial_shots: u64,
    /// Hard cap on the total shots of one estimate.
    pub max_shots: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            confidence: 1.96,
            tolerance: Tolerance::Relative(0.01),
            variance_change: 0.1,
            initial_shots: 128,
            max_shots: 100_000,
        }
    }
}

impl SamplerConfig {
    /// Set the precision target.
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the confidence quantile.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the shots of the first batch.
    pub fn with_initial_shots(mut self, shots: u64) -> Self {
        self.initial_shots = shots;
        self
    }

    /// Set the shot cap.
    pub fn with_max_shots(mut self, shots: u64) -> Self {
        self.max_shots = shots;
        self
    }

    /// Set the variance settling threshold.
    pub fn with_variance_change(mut self, change: f64) -> Self {
        self.variance_change = change;
        self
    }

    /// Check every setting.
    pub fn validate(&self) -> OptResult<()> {
        if !(self.confidence.is_finite() && self.confidence > 0.0) {
            return Err(OptError::InvalidConfiguration(format!(
                "sampler confidence must be positive, got {}",
                self.confidence
            )));
        }
        let tol = self.tolerance.value();
        if !(tol.is_finite() && tol > 0.0) {
            return Err(OptError::InvalidConfiguration(format!(
                "sampler tolerance must be positive, got {}",
                tol
            )));
        }
        if !(self.variance_change.is_finite() && self.variance_change >= 0.0) {
            return Err(OptError::InvalidConfiguration(format!(
                "variance change threshold must be non-negative, got {}",
                self.variance_change
            )));
        }
        if self.initial_shots == 0 {
            return Err(OptError::InvalidConfiguration(
                "initial shots must be at least 1".into(),
            ));
        }
        if self.max_shots < self.initial_shots {
            return Err(OptError::InvalidConfiguration(format!(
                "max shots {} below initial shots {}",
                self.max_shots, self.initial_shots
            )));
        }
        Ok(())
    }
}

/// Running totals after every iteration of the sampler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingHistory {
    /// Running expectation.
    pub expectations: Vec<f64>,
    /// Running variance.
    pub variances: Vec<f64>,
    /// Shots requested in that iteration.
    pub shots: Vec<u64>,
    /// Total shot target set at the end of that iteration.
    pub targets: Vec<u64>,
}

impl SamplingHistory {
    fn push(&mut self, expectation: f64, variance: f64, shots: u64, target: u64) {
        self.expectations.push(expectation);
        self.variances.push(variance);
        self.shots.push(shots);
        self.targets.push(target);
    }

    /// Number of iterations.
    pub fn len(&self) -> usize {
        self.shots.len()
    }

    /// True before the first iteration.
    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }
}

/// Result of an adaptive estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Expected cost.
    pub expectation: f64,
    /// Sample variance of the cost.
    pub variance: f64,
    /// Total shots consumed.
    pub shots: u64,
    /// Largest cost observed in any batch.
    pub best_observed: f64,
    /// Whether the precision target was met.
    pub converged: bool,
    /// Per-iteration running totals.
    pub history: SamplingHistory,
    /// Non-fatal conditions met on the way.
    pub warnings: Vec<Warning>,
}

/// Samples an oracle until a precision target is met.
#[derive(Debug, Clone)]
pub struct AdaptivePrecisionSampler {
    config: SamplerConfig,
}

impl AdaptivePrecisionSampler {
    /// Create a sampler; the configuration is validated.
    pub fn new(config: SamplerConfig) -> OptResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The sampler configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Estimate the expected cost of `params` to the configured precision.
    pub fn estimate<O>(
        &self,
        oracle: &mut O,
        params: &ParameterVector,
    ) -> Result<Estimate, OracleError>
    where
        O: Oracle + ?Sized,
    {
        let cfg = &self.config;
        let mut reducer = StatisticsReducer::new();
        let mut history = SamplingHistory::default();
        let mut warnings = Vec::new();

        let mut n_tot = 0u64;
        let mut mean = 0.0;
        let mut var = 0.0;
        let mut prev_var: Option<f64> = None;
        let mut n_req = cfg.initial_shots;
        let mut capped = false;

        loop {
            let n_new = n_req.saturating_sub(n_tot);
            if n_new > 0 {
                let dist = oracle.evaluate(params, Shots::Count(n_new))?;
                let batch = reducer.reduce(&dist, |o| oracle.cost(o));

                let Some(got) = batch.shots else {
                    // An exact answer consumes no shots and needs no more.
                    history.push(batch.expectation, 0.0, 0, 0);
                    return Ok(Estimate {
                        expectation: batch.expectation,
                        variance: 0.0,
                        shots: n_tot,
                        best_observed: reducer.best_observed(),
                        converged: true,
                        history,
                        warnings,
                    });
                };

                let (m, v) = pooled(
                    n_tot,
                    mean,
                    var,
                    got,
                    batch.expectation,
                    batch.variance.unwrap_or(0.0),
                );
                let (clamped, degenerate) = clamp_variance(v);
                if degenerate {
                    warnings.push(Warning::NumericDegeneracy { raw_variance: v });
                }
                mean = m;
                var = clamped;
                n_tot += got;
            }

            let required = required_shots(cfg.confidence, var, cfg.tolerance.absolute(mean));
            if required > cfg.max_shots {
                if !capped {
                    warn!(
                        required,
                        max_shots = cfg.max_shots,
                        "precision target unattainable, clamping shots"
                    );
                    warnings.push(Warning::PrecisionUnattainable {
                        required,
                        max_shots: cfg.max_shots,
                    });
                    capped = true;
                }
                n_req = cfg.max_shots;
            } else {
                n_req = required;
            }

            history.push(mean, var, n_new, n_req);

            let settled = prev_var.is_some_and(|p| (var - p).abs() <= cfg.variance_change * p.abs());
            prev_var = Some(var);

            debug!(
                iteration = history.len(),
                shots = n_tot,
                required = n_req,
                expectation = mean,
                variance = var,
                settled,
                "adaptive sampling step"
            );

            if (n_tot >= n_req && settled) || n_tot >= cfg.max_shots {
                return Ok(Estimate {
                    expectation: mean,
                    variance: var,
                    shots: n_tot,
                    best_observed: reducer.best_observed(),
                    converged: required <= n_tot && settled,
                    history,
                    warnings,
                });
            }
        }
    }
}

/// Shots needed for half-width `tolerance` at quantile `z`.
///
/// Saturates at `u64::MAX` when the tolerance is zero.
fn required_shots(z: f64, variance: f64, tolerance: f64) -> u64 {
    if variance <= 0.0 {
        return 0;
    }
    let n = (z * z * variance / (tolerance * tolerance)).ceil();
    if n.is_finite() && n < u64::MAX as f64 {
        n as u64
    } else {
        u64::MAX
    }
}

/// Combine two sample means and Bessel-corrected variances.
fn pooled(n_a: u64, mean_a: f64, var_a: f64, n_b: u64, mean_b: f64, var_b: f64) -> (f64, f64) {
    if n_a == 0 {
        return (mean_b, var_b);
    }
    let (na, nb) = (n_a as f64, n_b as f64);
    let n = na + nb;
    let delta = mean_b - mean_a;
    let mean = mean_a + delta * nb / n;
    let m2 = var_a * (na - 1.0) + var_b * (nb - 1.0).max(0.0) + delta * delta * na * nb / n;
    let var = if n > 1.0 { m2 / (n - 1.0) } else { 0.0 };
    (mean, var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Outcome, OutcomeDistribution};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Biased coin: outcome 1 with probability `p`, cost = outcome.
    struct Coin {
        p: f64,
        rng: StdRng,
        calls: Vec<u64>,
        exact_only: bool,
    }

    impl Coin {
        fn new(p: f64) -> Self {
            Self {
                p,
                rng: StdRng::seed_from_u64(11),
                calls: Vec::new(),
                exact_only: false,
            }
        }
    }

    impl Oracle for Coin {
        fn evaluate(
            &mut self,
            _params: &ParameterVector,
            shots: Shots,
        ) -> Result<OutcomeDistribution, OracleError> {
            let exact = OutcomeDistribution::from_probabilities(&[1.0 - self.p, self.p])?;
            match shots {
                Shots::Count(n) if !self.exact_only => {
                    self.calls.push(n);
                    exact.sample(n, &mut self.rng)
                }
                _ => Ok(exact),
            }
        }

        fn cost(&self, outcome: Outcome) -> f64 {
            outcome.0 as f64
        }
    }

    fn params() -> ParameterVector {
        ParameterVector::new(vec![0.1, 0.2], 2).unwrap()
    }

    #[test]
    fn test_pooled_matches_direct() {
        // samples a = [1, 2, 3], b = [4, 5]
        let (m, v) = pooled(3, 2.0, 1.0, 2, 4.5, 0.5);
        assert_relative_eq!(m, 3.0);
        assert_relative_eq!(v, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_required_shots() {
        assert_eq!(required_shots(2.0, 0.25, 0.1), 100);
        assert_eq!(required_shots(2.0, 0.0, 0.1), 0);
        assert_eq!(required_shots(2.0, 0.25, 0.0), u64::MAX);
    }

    #[test]
    fn test_config_validation() {
        assert!(SamplerConfig::default().validate().is_ok());
        assert!(SamplerConfig::default().with_initial_shots(0).validate().is_err());
        assert!(
            SamplerConfig::default()
                .with_tolerance(Tolerance::Absolute(0.0))
                .validate()
                .is_err()
        );
        assert!(
            SamplerConfig::default()
                .with_initial_shots(100)
                .with_max_shots(10)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_converges_to_coin_bias() {
        let sampler = AdaptivePrecisionSampler::new(
            SamplerConfig::default()
                .with_tolerance(Tolerance::Absolute(0.02))
                .with_max_shots(50_000),
        )
        .unwrap();
        let mut coin = Coin::new(0.3);
        let est = sampler.estimate(&mut coin, &params()).unwrap();

        assert!(est.converged);
        assert!(est.warnings.is_empty());
        assert!((est.expectation - 0.3).abs() < 0.05);
        assert_eq!(est.best_observed, 1.0);
        // n_req = 1.96² · 0.21 / 0.02² ≈ 2017
        assert!(est.shots >= 1500);
        assert_eq!(est.history.len(), est.history.expectations.len());
        assert_eq!(est.history.shots.iter().sum::<u64>(), est.shots);
        assert_eq!(coin.calls[0], 128);

        // each request tops the running total up to the previous target
        let requested: Vec<u64> = est.history.shots.iter().copied().filter(|&n| n > 0).collect();
        assert_eq!(requested, coin.calls);
        let mut consumed = 0;
        for i in 0..est.history.len() {
            let want = if i == 0 {
                128
            } else {
                est.history.targets[i - 1].saturating_sub(consumed)
            };
            assert_eq!(est.history.shots[i], want, "iteration {}", i);
            consumed += est.history.shots[i];
        }
        assert_eq!(consumed, est.shots);
    }

    #[test]
    fn test_exact_answer_consumes_no_shots() {
        let sampler = AdaptivePrecisionSampler::new(SamplerConfig::default()).unwrap();
        let mut coin = Coin::new(0.25);
        coin.exact_only = true;
        let est = sampler.estimate(&mut coin, &params()).unwrap();
        assert_eq!(est.expectation, 0.25);
        assert_eq!(est.shots, 0);
        assert_eq!(est.history.shots, vec![0]);
        assert_eq!(est.history.shots.iter().sum::<u64>(), est.shots);
        assert!(est.converged);
    }

    #[test]
    fn test_cap_emits_warning_and_terminates() {
        let sampler = AdaptivePrecisionSampler::new(
            SamplerConfig::default()
                .with_tolerance(Tolerance::Absolute(1e-6))
                .with_max_shots(1_000),
        )
        .unwrap();
        let mut coin = Coin::new(0.5);
        let est = sampler.estimate(&mut coin, &params()).unwrap();

        assert!(!est.converged);
        assert!(est.shots <= 1_000);
        assert!(matches!(
            est.warnings[0],
            Warning::PrecisionUnattainable { max_shots: 1_000, .. }
        ));
    }

    #[test]
    fn test_deterministic_outcome_stops_early() {
        let sampler = AdaptivePrecisionSampler::new(SamplerConfig::default()).unwrap();
        let mut coin = Coin::new(1.0);
        let est = sampler.estimate(&mut coin, &params()).unwrap();
        assert_eq!(est.variance, 0.0);
        assert_eq!(est.expectation, 1.0);
        assert_eq!(coin.calls, vec![128]);
        assert!(est.converged);
    }

    #[test]
    fn test_zero_mean_relative_tolerance_terminates() {
        let sampler = AdaptivePrecisionSampler::new(
            SamplerConfig::default()
                .with_tolerance(Tolerance::Relative(0.01))
                .with_max_shots(500),
        )
        .unwrap();
        let mut coin = Coin::new(0.0);
        let est = sampler.estimate(&mut coin, &params()).unwrap();
        assert_eq!(est.expectation, 0.0);
        assert!(est.shots <= 500);
    }
}
