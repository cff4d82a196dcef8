//! Measurement outcomes and outcome distributions.
//!
//! # Bit order
//!
//! An [`Outcome`] packs a measured bitstring into an integer where bit `q`
//! holds the value of qubit `q`. Backends that report MSB-first text
//! (`"0110"` with qubit 0 rightmost) are converted once, with
//! [`Outcome::from_msb_str`] or [`Outcome::from_hex`], before the outcome
//! reaches a cost function. Cost functions never reverse bits themselves.

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// Tolerance on the total mass of an exact distribution.
const NORMALIZATION_TOL: f64 = 1e-6;

/// A measured bitstring, bit `q` = qubit `q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(pub u64);

impl Outcome {
    /// Value of one qubit.
    pub fn bit(self, qubit: usize) -> bool {
        (self.0 >> qubit) & 1 == 1
    }

    /// Qubit values in qubit order (index 0 = qubit 0).
    pub fn bits(self, width: usize) -> Vec<u8> {
        (0..width).map(|q| ((self.0 >> q) & 1) as u8).collect()
    }

    /// Build from qubit-ordered bits.
    pub fn from_bits(bits: &[u8]) -> Self {
        Outcome(
            bits.iter()
                .enumerate()
                .fold(0u64, |acc, (q, &b)| acc | (u64::from(b & 1) << q)),
        )
    }

    /// Parse an MSB-first bitstring such as `"0110"` (qubit 0 is the last character).
    pub fn from_msb_str(s: &str) -> Result<Self, OracleError> {
        let s = s.trim();
        if s.is_empty() || s.len() > 64 {
            return Err(OracleError::Malformed(format!("bad bitstring '{}'", s)));
        }
        u64::from_str_radix(s, 2)
            .map(Outcome)
            .map_err(|_| OracleError::Malformed(format!("bad bitstring '{}'", s)))
    }

    /// Parse a hexadecimal outcome key such as `"0x6"`.
    pub fn from_hex(s: &str) -> Result<Self, OracleError> {
        let digits = s
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        u64::from_str_radix(digits, 16)
            .map(Outcome)
            .map_err(|_| OracleError::Malformed(format!("bad hex outcome '{}'", s)))
    }

    /// MSB-first text form padded to `width` bits.
    pub fn to_msb_string(self, width: usize) -> String {
        format!("{:0width$b}", self.0, width = width)
    }
}

/// Outcome data returned by an oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeDistribution {
    /// Exact probabilities, e.g. from a statevector.
    Exact { probabilities: FxHashMap<Outcome, f64> },
    /// Counts from a finite number of shots.
    Sampled {
        counts: FxHashMap<Outcome, u64>,
        shots: u64,
    },
}

impl OutcomeDistribution {
    /// Build an exact distribution; probabilities must be non-negative and sum to one.
    pub fn exact<I>(probabilities: I) -> Result<Self, OracleError>
    where
        I: IntoIterator<Item = (Outcome, f64)>,
    {
        let mut map = FxHashMap::default();
        let mut total = 0.0;
        for (outcome, p) in probabilities {
            if !p.is_finite() || p < 0.0 {
                return Err(OracleError::Malformed(format!(
                    "probability {} for outcome {}",
                    p, outcome.0
                )));
            }
            if p > 0.0 {
                *map.entry(outcome).or_insert(0.0) += p;
                total += p;
            }
        }
        if (total - 1.0).abs() > NORMALIZATION_TOL {
            return Err(OracleError::Malformed(format!(
                "probabilities sum to {}",
                total
            )));
        }
        Ok(OutcomeDistribution::Exact { probabilities: map })
    }

    /// Build an exact distribution from a dense vector indexed by outcome.
    pub fn from_probabilities(probabilities: &[f64]) -> Result<Self, OracleError> {
        Self::exact(
            probabilities
                .iter()
                .enumerate()
                .map(|(i, &p)| (Outcome(i as u64), p)),
        )
    }

    /// Build a sampled distribution; the shot count is the sum of counts.
    pub fn sampled<I>(counts: I) -> Result<Self, OracleError>
    where
        I: IntoIterator<Item = (Outcome, u64)>,
    {
        let mut map = FxHashMap::default();
        let mut shots = 0u64;
        for (outcome, count) in counts {
            if count > 0 {
                *map.entry(outcome).or_insert(0) += count;
                shots += count;
            }
        }
        if shots == 0 {
            return Err(OracleError::Malformed("no shots recorded".into()));
        }
        Ok(OutcomeDistribution::Sampled { counts: map, shots })
    }

    /// Whether this is an exact distribution.
    pub fn is_exact(&self) -> bool {
        matches!(self, OutcomeDistribution::Exact { .. })
    }

    /// Total shots for sampled data.
    pub fn shots(&self) -> Option<u64> {
        match self {
            OutcomeDistribution::Exact { .. } => None,
            OutcomeDistribution::Sampled { shots, .. } => Some(*shots),
        }
    }

    /// Number of distinct outcomes with positive weight.
    pub fn len(&self) -> usize {
        match self {
            OutcomeDistribution::Exact { probabilities } => probabilities.len(),
            OutcomeDistribution::Sampled { counts, .. } => counts.len(),
        }
    }

    /// True if no outcome has positive weight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outcomes with their relative frequency.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Outcome, f64)> + '_> {
        match self {
            OutcomeDistribution::Exact { probabilities } => {
                Box::new(probabilities.iter().map(|(&o, &p)| (o, p)))
            }
            OutcomeDistribution::Sampled { counts, shots } => {
                let n = *shots as f64;
                Box::new(counts.iter().map(move |(&o, &c)| (o, c as f64 / n)))
            }
        }
    }

    /// Relative frequency of one outcome.
    pub fn probability(&self, outcome: Outcome) -> f64 {
        match self {
            OutcomeDistribution::Exact { probabilities } => {
                probabilities.get(&outcome).copied().unwrap_or(0.0)
            }
            OutcomeDistribution::Sampled { counts, shots } => {
                counts.get(&outcome).copied().unwrap_or(0) as f64 / *shots as f64
            }
        }
    }

    /// Draw `shots` samples from this distribution.
    pub fn sample<R: Rng + ?Sized>(&self, shots: u64, rng: &mut R) -> Result<Self, OracleError> {
        if shots == 0 {
            return Err(OracleError::InvalidParameters(
                "cannot draw zero shots".into(),
            ));
        }
        let (outcomes, weights): (Vec<Outcome>, Vec<f64>) = self.iter().unzip();
        let index = WeightedIndex::new(&weights)
            .map_err(|e| OracleError::Malformed(format!("cannot sample: {}", e)))?;
        let mut counts: FxHashMap<Outcome, u64> = FxHashMap::default();
        for _ in 0..shots {
            *counts.entry(outcomes[index.sample(rng)]).or_insert(0) += 1;
        }
        Ok(OutcomeDistribution::Sampled { counts, shots })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_bit_order() {
        // "110" MSB-first: qubit 2 = 1, qubit 1 = 1, qubit 0 = 0
        let o = Outcome::from_msb_str("110").unwrap();
        assert_eq!(o, Outcome(6));
        assert!(!o.bit(0));
        assert!(o.bit(1));
        assert!(o.bit(2));
        assert_eq!(o.bits(3), vec![0, 1, 1]);
        assert_eq!(Outcome::from_bits(&[0, 1, 1]), o);
        assert_eq!(o.to_msb_string(4), "0110");
        assert_eq!(Outcome::from_hex("0x6").unwrap(), o);
        assert!(Outcome::from_msb_str("012").is_err());
    }

    #[test]
    fn test_exact_validation() {
        assert!(OutcomeDistribution::from_probabilities(&[0.25, 0.75]).is_ok());
        assert!(OutcomeDistribution::from_probabilities(&[0.5, 0.6]).is_err());
        assert!(OutcomeDistribution::from_probabilities(&[1.5, -0.5]).is_err());
    }

    #[test]
    fn test_zero_probabilities_dropped() {
        let d = OutcomeDistribution::from_probabilities(&[0.0, 1.0, 0.0, 0.0]).unwrap();
        assert_eq!(d.len(), 1);
        assert_eq!(d.probability(Outcome(1)), 1.0);
    }

    #[test]
    fn test_sampled() {
        let d = OutcomeDistribution::sampled(vec![(Outcome(0), 3), (Outcome(1), 1)]).unwrap();
        assert_eq!(d.shots(), Some(4));
        assert_relative_eq!(d.probability(Outcome(0)), 0.75);
        assert!(OutcomeDistribution::sampled(vec![(Outcome(0), 0)]).is_err());
    }

    #[test]
    fn test_sample_from_exact() {
        let d = OutcomeDistribution::from_probabilities(&[0.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let s = d.sample(100, &mut rng).unwrap();
        assert_eq!(s.shots(), Some(100));
        assert_eq!(s.probability(Outcome(1)), 1.0);
    }
}
