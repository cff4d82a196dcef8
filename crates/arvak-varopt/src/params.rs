//! Variational parameters and their bounds.
//!
//! A [`ParameterVector`] stores the angles of a layered circuit
//! layer-major: for two angle classes the layout is
//! `[gamma_1, beta_1, gamma_2, beta_2, ...]`, for three
//! `[gamma_1, beta_1, delta_1, ...]`. Reshaping into a `depth x classes`
//! matrix is therefore a plain row-major view.

use std::f64::consts::PI;
use std::fmt;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{OptError, OptResult};

/// A named role of a scalar parameter within a layer, with its domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AngleClass {
    /// Name used in logs and reports.
    pub name: String,
    /// Lower bound of the domain.
    pub lower: f64,
    /// Upper bound of the domain.
    pub upper: f64,
    /// Whether the domain wraps around (angles) or is clamped.
    #[serde(default)]
    pub periodic: bool,
}

impl AngleClass {
    /// Create a clamped angle class.
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
            periodic: false,
        }
    }

    /// Mark the domain as periodic.
    pub fn periodic(mut self) -> Self {
        self.periodic = true;
        self
    }

    /// Cost angle, periodic on `[0, 2π)`.
    pub fn gamma() -> Self {
        Self::new("gamma", 0.0, 2.0 * PI).periodic()
    }

    /// Mixer angle, periodic on `[0, π)`.
    pub fn beta() -> Self {
        Self::new("beta", 0.0, PI).periodic()
    }

    /// Secondary cost angle of interlaced layers, periodic on `[0, 2π)`.
    pub fn delta() -> Self {
        Self::new("delta", 0.0, 2.0 * PI).periodic()
    }

    /// Width of the domain.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Check that the domain is non-empty and finite.
    pub fn validate(&self) -> OptResult<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower >= self.upper {
            return Err(OptError::InvalidBounds {
                class: self.name.clone(),
                lower: self.lower,
                upper: self.upper,
            });
        }
        Ok(())
    }

    /// Bring a value into the domain: wrap if periodic, clamp otherwise.
    pub fn fold(&self, value: f64) -> f64 {
        if self.periodic {
            self.lower + (value - self.lower).rem_euclid(self.width())
        } else {
            value.clamp(self.lower, self.upper)
        }
    }
}

/// Bounds for every angle class of a layer, in layer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBounds {
    classes: Vec<AngleClass>,
}

impl ParameterBounds {
    /// Create bounds from angle classes in layer order.
    pub fn new(classes: Vec<AngleClass>) -> Self {
        Self { classes }
    }

    /// Standard QAOA layer: gamma then beta.
    pub fn standard() -> Self {
        Self::new(vec![AngleClass::gamma(), AngleClass::beta()])
    }

    /// Interlaced layer: gamma, beta and delta.
    pub fn interlaced() -> Self {
        Self::new(vec![
            AngleClass::gamma(),
            AngleClass::beta(),
            AngleClass::delta(),
        ])
    }

    /// Angle classes in layer order.
    pub fn classes(&self) -> &[AngleClass] {
        &self.classes
    }

    /// Number of angle classes per layer.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Validate every angle class.
    pub fn validate(&self) -> OptResult<()> {
        if self.classes.is_empty() {
            return Err(OptError::InvalidConfiguration(
                "at least one angle class is required".into(),
            ));
        }
        self.classes.iter().try_for_each(AngleClass::validate)
    }

    /// Per-parameter `(lower, upper)` box for a vector of the given depth.
    pub fn box_constraints(&self, depth: usize) -> Vec<(f64, f64)> {
        (0..depth)
            .flat_map(|_| self.classes.iter().map(|c| (c.lower, c.upper)))
            .collect()
    }

    /// Fold every parameter into its class domain.
    pub fn fold(&self, params: &ParameterVector) -> ParameterVector {
        let c = self.classes.len();
        let values = params
            .as_slice()
            .iter()
            .enumerate()
            .map(|(i, &v)| self.classes[i % c].fold(v))
            .collect();
        ParameterVector {
            values,
            classes: params.classes,
        }
    }

    /// Shift periodic angles by whole periods so each layer lies within half
    /// a period of the layer before it.
    ///
    /// Non-periodic classes are left alone. The result may leave the domain.
    pub fn unwrap(&self, params: &ParameterVector) -> ParameterVector {
        let c = self.classes.len();
        let mut values = params.values.clone();
        for i in c..values.len() {
            let class = &self.classes[i % c];
            if class.periodic {
                let w = class.width();
                let prev = values[i - c];
                values[i] -= ((values[i] - prev) / w).round() * w;
            }
        }
        ParameterVector {
            values,
            classes: params.classes,
        }
    }

    /// Check that a vector matches these bounds in angle-class count.
    pub fn check(&self, params: &ParameterVector) -> OptResult<()> {
        if params.classes() != self.num_classes() {
            return Err(OptError::LengthMismatch {
                len: params.len(),
                depth: params.depth(),
                classes: self.num_classes(),
            });
        }
        Ok(())
    }
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self::standard()
    }
}

/// Angles of a layered circuit, stored layer-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ParameterData", try_from = "ParameterData")]
pub struct ParameterVector {
    values: Vec<f64>,
    classes: usize,
}

/// Serialized form of a [`ParameterVector`], checked on the way in.
#[derive(Serialize, Deserialize)]
struct ParameterData {
    values: Vec<f64>,
    classes: usize,
}

impl From<ParameterVector> for ParameterData {
    fn from(params: ParameterVector) -> Self {
        Self {
            values: params.values,
            classes: params.classes,
        }
    }
}

impl TryFrom<ParameterData> for ParameterVector {
    type Error = OptError;

    fn try_from(data: ParameterData) -> OptResult<Self> {
        ParameterVector::new(data.values, data.classes)
    }
}

impl ParameterVector {
    /// Create a vector with `classes` angles per layer.
    ///
    /// The length must be a positive multiple of `classes`.
    pub fn new(values: Vec<f64>, classes: usize) -> OptResult<Self> {
        if classes == 0 || values.is_empty() || values.len() % classes != 0 {
            return Err(OptError::LengthMismatch {
                len: values.len(),
                depth: values.len() / classes.max(1),
                classes,
            });
        }
        Ok(Self { values, classes })
    }

    /// Create a vector whose shape is already known to be valid.
    pub(crate) fn from_parts(values: Vec<f64>, classes: usize) -> Self {
        debug_assert!(classes > 0 && !values.is_empty() && values.len() % classes == 0);
        Self { values, classes }
    }

    /// Create a vector and require a specific depth.
    pub fn with_depth(values: Vec<f64>, depth: usize, classes: usize) -> OptResult<Self> {
        if values.len() != depth * classes {
            return Err(OptError::LengthMismatch {
                len: values.len(),
                depth,
                classes,
            });
        }
        Self::new(values, classes)
    }

    /// Flatten a `depth x classes` matrix row by row.
    pub fn from_layers(layers: &Array2<f64>) -> OptResult<Self> {
        let classes = layers.ncols();
        Self::new(layers.iter().copied().collect(), classes)
    }

    /// Number of layers.
    pub fn depth(&self) -> usize {
        self.values.len() / self.classes
    }

    /// Number of angle classes per layer.
    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Total number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; a parameter vector has at least one layer.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The flat parameters.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Consume into the flat parameters.
    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Angles of one layer.
    pub fn layer(&self, index: usize) -> &[f64] {
        &self.values[index * self.classes..(index + 1) * self.classes]
    }

    /// All values of one angle class, one per layer.
    pub fn class_values(&self, class: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(class)
            .step_by(self.classes)
            .copied()
            .collect()
    }

    /// Reshape into a `depth x classes` matrix.
    pub fn layers(&self) -> Array2<f64> {
        let c = self.classes;
        Array2::from_shape_fn((self.depth(), c), |(i, j)| self.values[i * c + j])
    }

    /// New vector of the same shape with different values.
    pub fn with_values(&self, values: Vec<f64>) -> OptResult<Self> {
        Self::with_depth(values, self.depth(), self.classes)
    }
}

impl fmt::Display for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:.4}", v)?;
        }
        write!(f, "]")
    }
}
