//! Reduction of outcome data to cost statistics.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::outcome::{Outcome, OutcomeDistribution};

/// Cost statistics of one outcome distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Expected cost.
    pub expectation: f64,
    /// Bessel-corrected sample variance; `None` for exact distributions.
    pub variance: Option<f64>,
    /// Largest cost seen so far by the reducer that produced this value.
    pub best_observed: f64,
    /// Shots behind the estimate; `None` for exact distributions.
    pub shots: Option<u64>,
}

/// Turns outcome distributions into [`Statistics`].
///
/// The reducer keeps a running maximum of observed costs across every
/// distribution it has seen, so batches of results can be reduced one at
/// a time without losing the best sample.
#[derive(Debug, Clone)]
pub struct StatisticsReducer {
    best_observed: f64,
}

impl StatisticsReducer {
    /// Create a reducer with no observations.
    pub fn new() -> Self {
        Self {
            best_observed: f64::NEG_INFINITY,
        }
    }

    /// Best cost observed so far, `-inf` before the first reduction.
    pub fn best_observed(&self) -> f64 {
        self.best_observed
    }

    /// Reduce one distribution.
    pub fn reduce<C>(&mut self, distribution: &OutcomeDistribution, cost: C) -> Statistics
    where
        C: Fn(Outcome) -> f64,
    {
        let mut e1 = 0.0;
        let mut e2 = 0.0;
        for (outcome, weight) in distribution.iter() {
            let c = cost(outcome);
            self.best_observed = self.best_observed.max(c);
            e1 += c * weight;
            e2 += c * c * weight;
        }

        let variance = distribution.shots().map(|n| {
            if n <= 1 {
                0.0
            } else {
                let n = n as f64;
                clamp_variance((e2 - e1 * e1) * n / (n - 1.0)).0
            }
        });

        Statistics {
            expectation: e1,
            variance,
            best_observed: self.best_observed,
            shots: distribution.shots(),
        }
    }

    /// Reduce several distributions, one entry per distribution.
    pub fn reduce_batch<C>(
        &mut self,
        distributions: &[OutcomeDistribution],
        cost: C,
    ) -> Vec<Statistics>
    where
        C: Fn(Outcome) -> f64,
    {
        distributions
            .iter()
            .map(|d| self.reduce(d, &cost))
            .collect()
    }
}

impl Default for StatisticsReducer {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce a single distribution with a fresh reducer.
pub fn reduce<C>(distribution: &OutcomeDistribution, cost: C) -> Statistics
where
    C: Fn(Outcome) -> f64,
{
    StatisticsReducer::new().reduce(distribution, cost)
}

/// Probability mass of the outcomes accepted by `is_feasible`.
pub fn success_probability<F>(distribution: &OutcomeDistribution, is_feasible: F) -> f64
where
    F: Fn(Outcome) -> bool,
{
    distribution
        .iter()
        .filter(|(o, _)| is_feasible(*o))
        .map(|(_, p)| p)
        .sum()
}

/// Clamp a variance estimate that cancellation pushed below zero.
///
/// Returns the clamped value and whether clamping happened.
pub(crate) fn clamp_variance(raw: f64) -> (f64, bool) {
    if raw.is_nan() || raw < 0.0 {
        debug!(raw_variance = raw, "clamping degenerate variance to zero");
        (0.0, true)
    } else {
        (raw, false)
    }
}
