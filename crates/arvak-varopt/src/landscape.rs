//! Depth-1 energy landscape scan.
//!
//! The grid has one axis per angle class, in angle-class order. Axis `k`
//! holds `resolution[k]` points spaced evenly over `[lower, upper)`.
//! Grid points are enumerated in row-major order (last axis fastest) and
//! the same [`unravel`] routine maps flat positions to axis indices when
//! building points and when decoding the minimum, so the two can never
//! disagree on axis order.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::LandscapeCache;
use crate::error::{OptError, OptResult, OracleError};
use crate::oracle::{Oracle, Shots};
use crate::params::{ParameterBounds, ParameterVector};
use crate::stats::StatisticsReducer;

/// Bounds and resolution of a landscape grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Domain of every angle class.
    pub bounds: ParameterBounds,
    /// Number of points per axis, in angle-class order.
    pub resolution: Vec<usize>,
}

impl GridSpec {
    /// Create a grid specification.
    pub fn new(bounds: ParameterBounds, resolution: Vec<usize>) -> Self {
        Self { bounds, resolution }
    }

    /// Standard gamma/beta grid.
    pub fn standard(gamma_points: usize, beta_points: usize) -> Self {
        Self::new(ParameterBounds::standard(), vec![gamma_points, beta_points])
    }

    /// Check bounds and resolution.
    pub fn validate(&self) -> OptResult<()> {
        self.bounds.validate()?;
        if self.resolution.len() != self.bounds.num_classes() {
            return Err(OptError::InvalidConfiguration(format!(
                "{} grid axes given for {} angle classes",
                self.resolution.len(),
                self.bounds.num_classes()
            )));
        }
        if let Some(axis) = self.resolution.iter().position(|&n| n == 0) {
            return Err(OptError::InvalidResolution { axis, points: 0 });
        }
        Ok(())
    }

    /// Number of grid points.
    pub fn num_points(&self) -> usize {
        self.resolution.iter().product()
    }

    /// Coordinates along one axis.
    pub fn axis(&self, axis: usize) -> Vec<f64> {
        let class = &self.bounds.classes()[axis];
        let n = self.resolution[axis];
        let step = class.width() / n as f64;
        (0..n).map(|i| class.lower + i as f64 * step).collect()
    }

    /// Depth-1 parameters of the grid point with the given axis indices.
    pub fn point(&self, index: &[usize]) -> ParameterVector {
        let values = index
            .iter()
            .enumerate()
            .map(|(axis, &i)| {
                let class = &self.bounds.classes()[axis];
                class.lower + i as f64 * class.width() / self.resolution[axis] as f64
            })
            .collect();
        ParameterVector::from_parts(values, self.resolution.len())
    }

    /// All grid points in row-major order.
    pub fn points(&self) -> Vec<ParameterVector> {
        (0..self.num_points())
            .map(|flat| self.point(&unravel(flat, &self.resolution)))
            .collect()
    }
}

/// Row-major multi-index of a flat position.
pub fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (axis, &n) in shape.iter().enumerate().rev() {
        index[axis] = flat % n;
        flat /= n;
    }
    index
}

/// Objective values over a grid, with the location of the minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "LandscapeData", try_from = "LandscapeData")]
pub struct Landscape {
    grid: GridSpec,
    values: ArrayD<f64>,
    best_index: Vec<usize>,
}

impl Landscape {
    /// Build from objective values listed in row-major grid order.
    pub fn from_values(grid: GridSpec, values: Vec<f64>) -> OptResult<Self> {
        grid.validate()?;
        if values.len() != grid.num_points() {
            return Err(OptError::InvalidConfiguration(format!(
                "{} landscape values for {} grid points",
                values.len(),
                grid.num_points()
            )));
        }

        // NaN never wins; ties keep the first point
        let mut best_flat = 0;
        for (i, &v) in values.iter().enumerate() {
            let best = values[best_flat];
            if !v.is_nan() && (best.is_nan() || v < best) {
                best_flat = i;
            }
        }
        let best_index = unravel(best_flat, &grid.resolution);

        let values = ArrayD::from_shape_vec(IxDyn(&grid.resolution), values)
            .map_err(|e| OptError::InvalidConfiguration(format!("landscape shape: {}", e)))?;

        Ok(Self {
            grid,
            values,
            best_index,
        })
    }

    /// Grid the landscape was computed on.
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Objective values, one axis per angle class.
    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    /// Objective at a grid index.
    pub fn value_at(&self, index: &[usize]) -> Option<f64> {
        self.values.get(IxDyn(index)).copied()
    }

    /// Axis indices of the minimum.
    pub fn best_index(&self) -> &[usize] {
        &self.best_index
    }

    /// Minimal objective value.
    pub fn best_value(&self) -> f64 {
        self.values[IxDyn(&self.best_index)]
    }

    /// Parameters of the minimum; the depth-1 seed.
    pub fn best_point(&self) -> ParameterVector {
        self.grid.point(&self.best_index)
    }
}

/// Flat serialized form of a [`Landscape`].
#[derive(Serialize, Deserialize)]
struct LandscapeData {
    grid: GridSpec,
    values: Vec<f64>,
}

impl From<Landscape> for LandscapeData {
    fn from(landscape: Landscape) -> Self {
        Self {
            values: landscape.values.iter().copied().collect(),
            grid: landscape.grid,
        }
    }
}

impl TryFrom<LandscapeData> for Landscape {
    type Error = OptError;

    fn try_from(data: LandscapeData) -> OptResult<Self> {
        Landscape::from_values(data.grid, data.values)
    }
}

/// Evaluates the oracle on every point of a depth-1 grid.
#[derive(Debug, Clone)]
pub struct LandscapeScanner {
    grid: GridSpec,
    shots: Shots,
    cache: Option<LandscapeCache>,
}

impl LandscapeScanner {
    /// Create a scanner; the grid is validated.
    pub fn new(grid: GridSpec) -> OptResult<Self> {
        grid.validate()?;
        Ok(Self {
            grid,
            shots: Shots::Default,
            cache: None,
        })
    }

    /// Shots to request per grid point.
    pub fn with_shots(mut self, shots: Shots) -> Self {
        self.shots = shots;
        self
    }

    /// Reuse landscapes stored in `cache`.
    pub fn with_cache(mut self, cache: LandscapeCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The grid being scanned.
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    /// Scan the grid, with one batched oracle request.
    pub fn scan<O>(&self, oracle: &mut O) -> Result<Landscape, OracleError>
    where
        O: Oracle + ?Sized,
    {
        let identity = oracle.identity();
        if let (Some(cache), Some(id)) = (&self.cache, &identity) {
            if let Some(landscape) = cache.load(id, &self.grid) {
                info!(problem = %id, "reusing cached landscape");
                return Ok(landscape);
            }
        }

        let points = self.grid.points();
        info!(
            points = points.len(),
            resolution = ?self.grid.resolution,
            "scanning energy landscape"
        );

        let distributions = oracle.evaluate_batch(&points, self.shots)?;
        if distributions.len() != points.len() {
            return Err(OracleError::Malformed(format!(
                "{} results for {} circuits",
                distributions.len(),
                points.len()
            )));
        }

        let mut reducer = StatisticsReducer::new();
        let values: Vec<f64> = reducer
            .reduce_batch(&distributions, |o| oracle.cost(o))
            .iter()
            .map(|s| -s.expectation)
            .collect();

        let landscape = Landscape::from_values(self.grid.clone(), values)
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        debug!(
            best = %landscape.best_point(),
            objective = landscape.best_value(),
            best_observed = reducer.best_observed(),
            "landscape scan done"
        );

        if let (Some(cache), Some(id)) = (&self.cache, &identity) {
            cache.store(id, &landscape);
        }
        Ok(landscape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Outcome, OutcomeDistribution};
    use crate::params::AngleClass;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    /// cost(0) = 0, cost(1) = 1, P(1) = sin²(gamma).
    struct SinOracle {
        batches: usize,
    }

    impl Oracle for SinOracle {
        fn evaluate(
            &mut self,
            params: &ParameterVector,
            _shots: Shots,
        ) -> Result<OutcomeDistribution, OracleError> {
            let p1 = params.as_slice()[0].sin().powi(2);
            OutcomeDistribution::from_probabilities(&[1.0 - p1, p1])
        }

        fn evaluate_batch(
            &mut self,
            params: &[ParameterVector],
            shots: Shots,
        ) -> Result<Vec<OutcomeDistribution>, OracleError> {
            self.batches += 1;
            params.iter().map(|p| self.evaluate(p, shots)).collect()
        }

        fn cost(&self, outcome: Outcome) -> f64 {
            outcome.0 as f64
        }
    }

    #[test]
    fn test_axis_excludes_endpoint() {
        let grid = GridSpec::new(
            ParameterBounds::new(vec![AngleClass::new("gamma", 0.0, PI)]),
            vec![4],
        );
        let axis = grid.axis(0);
        assert_eq!(axis.len(), 4);
        assert_relative_eq!(axis[3], 0.75 * PI);
    }

    #[test]
    fn test_unravel_row_major() {
        assert_eq!(unravel(0, &[3, 4]), vec![0, 0]);
        assert_eq!(unravel(5, &[3, 4]), vec![1, 1]);
        assert_eq!(unravel(11, &[3, 4]), vec![2, 3]);
        assert_eq!(unravel(7, &[2, 2, 2]), vec![1, 1, 1]);
    }

    #[test]
    fn test_points_follow_axis_order() {
        let grid = GridSpec::standard(4, 2);
        let points = grid.points();
        assert_eq!(points.len(), 8);
        // beta (last axis) varies fastest
        assert_eq!(points[0].as_slice(), &[0.0, 0.0]);
        assert_relative_eq!(points[1].as_slice()[1], PI / 2.0);
        assert_relative_eq!(points[2].as_slice()[0], PI / 2.0);
    }

    #[test]
    fn test_grid_validation() {
        assert!(GridSpec::standard(0, 4).validate().is_err());
        assert!(GridSpec::new(ParameterBounds::standard(), vec![3]).validate().is_err());
        assert!(LandscapeScanner::new(GridSpec::standard(2, 0)).is_err());
    }

    #[test]
    fn test_toy_landscape_finds_half_pi() {
        let grid = GridSpec::new(
            ParameterBounds::new(vec![AngleClass::new("gamma", 0.0, PI)]),
            vec![8],
        );
        let scanner = LandscapeScanner::new(grid).unwrap();
        let mut oracle = SinOracle { batches: 0 };
        let landscape = scanner.scan(&mut oracle).unwrap();

        assert_eq!(oracle.batches, 1);
        assert_eq!(landscape.best_index(), &[4]);
        assert_relative_eq!(landscape.best_point().as_slice()[0], PI / 2.0);
        assert_relative_eq!(landscape.best_value(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nan_never_best() {
        let grid = GridSpec::new(
            ParameterBounds::new(vec![AngleClass::new("x", 0.0, 1.0)]),
            vec![3],
        );
        let landscape = Landscape::from_values(grid, vec![f64::NAN, 2.0, 1.0]).unwrap();
        assert_eq!(landscape.best_index(), &[2]);
    }

    #[test]
    fn test_serde_roundtrip() {
        let landscape =
            Landscape::from_values(GridSpec::standard(2, 3), vec![0.0, 1.0, -2.0, 3.0, 4.0, 5.0])
                .unwrap();
        let json = serde_json::to_string(&landscape).unwrap();
        let back: Landscape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, landscape);
        assert_eq!(back.best_index(), &[0, 2]);
    }

    proptest! {
        #[test]
        fn prop_best_point_holds_minimum(
            shape in proptest::collection::vec(1usize..5, 1..4),
            seed in proptest::collection::vec(-100.0f64..100.0, 64),
        ) {
            let n: usize = shape.iter().product();
            let values: Vec<f64> = (0..n).map(|i| seed[i % seed.len()] + i as f64 * 1e-3).collect();
            let classes = shape
                .iter()
                .enumerate()
                .map(|(k, _)| AngleClass::new(format!("c{}", k), -1.0, 1.0))
                .collect();
            let grid = GridSpec::new(ParameterBounds::new(classes), shape.clone());
            let landscape = Landscape::from_values(grid.clone(), values.clone()).unwrap();

            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            prop_assert_eq!(landscape.best_value(), min);

            // the decoded point is the grid point that was built for the minimum
            let flat = values.iter().position(|&v| v == min).unwrap();
            prop_assert_eq!(landscape.best_point(), grid.points()[flat].clone());
        }
    }
}
