//! Depth extrapolation by linear interpolation (INTERP).
//!
//! The optimized angles of depth `p` are read as samples of a smooth
//! schedule and resampled at `p + 1` points:
//!
//! ```text
//! out[0]     = in[0]
//! out[i - 1] = ((i - 1) / p) · in[i - 2] + ((p - i + 1) / p) · in[i - 1],  i = 2..=p
//! out[p]     = in[p - 1]
//! ```
//!
//! (1-indexed `i` in the interior formula, 0-indexed rows elsewhere.)

use ndarray::Array2;

use crate::params::{ParameterBounds, ParameterVector};

/// Seed for depth `p + 1` from the parameters of depth `p`.
pub fn interp(params: &ParameterVector) -> ParameterVector {
    let layers = interp_layers(&params.layers());
    ParameterVector::from_parts(layers.iter().copied().collect(), params.classes())
}

/// INTERP for angles living in `bounds`.
///
/// Periodic classes are unwrapped layer by layer before interpolating and
/// the seed is folded back into the domain afterwards, so two neighbouring
/// layers on either side of a period boundary are not averaged across it.
pub fn interp_within(params: &ParameterVector, bounds: &ParameterBounds) -> ParameterVector {
    bounds.fold(&interp(&bounds.unwrap(params)))
}

/// INTERP on a `p x C` matrix, returning `(p + 1) x C`.
pub fn interp_layers(input: &Array2<f64>) -> Array2<f64> {
    let (p, c) = input.dim();
    let mut out = Array2::zeros((p + 1, c));
    if p == 0 {
        return out;
    }
    out.row_mut(0).assign(&input.row(0));
    out.row_mut(p).assign(&input.row(p - 1));
    let pf = p as f64;
    for i in 2..=p {
        let a = (i - 1) as f64 / pf;
        let b = (p - i + 1) as f64 / pf;
        for k in 0..c {
            out[[i - 1, k]] = a * input[[i - 2, k]] + b * input[[i - 1, k]];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_depth_one_duplicates_row() {
        let out = interp_layers(&array![[1.0, 2.0]]);
        assert_eq!(out, array![[1.0, 2.0], [1.0, 2.0]]);
    }

    #[test]
    fn test_depth_two_midpoint() {
        let out = interp_layers(&array![[0.0, 0.0], [2.0, 4.0]]);
        assert_eq!(out, array![[0.0, 0.0], [1.0, 2.0], [2.0, 4.0]]);
    }

    #[test]
    fn test_depth_three() {
        let out = interp_layers(&array![[0.0], [3.0], [6.0]]);
        // i = 2: 1/3 · 0 + 2/3 · 3 = 2; i = 3: 2/3 · 3 + 1/3 · 6 = 4
        for (got, want) in out.iter().zip([0.0, 2.0, 4.0, 6.0]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_vector_layout_preserved() {
        let x = ParameterVector::new(vec![0.1, 0.2, 0.3, 0.5, 0.6, 0.7], 3).unwrap();
        let y = interp(&x);
        assert_eq!(y.depth(), 3);
        assert_eq!(y.classes(), 3);
        assert_eq!(y.layer(0), &[0.1, 0.2, 0.3]);
        assert_eq!(y.layer(2), &[0.5, 0.6, 0.7]);
        assert_abs_diff_eq!(y.layer(1)[0], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_interp_within_unwraps_periodic_gamma() {
        // gamma of layer 2 sits just below 2π, i.e. just below zero
        let x = ParameterVector::new(vec![0.2, 0.8562, 6.1832, 0.9980], 2).unwrap();
        let y = interp_within(&x, &ParameterBounds::standard());
        assert_eq!(y.depth(), 3);
        assert_abs_diff_eq!(y.layer(0)[0], 0.2, epsilon = 1e-12);
        let mid = (0.2 + (6.1832 - 2.0 * std::f64::consts::PI)) / 2.0;
        assert_abs_diff_eq!(y.layer(1)[0], mid, epsilon = 1e-12);
        assert_abs_diff_eq!(y.layer(1)[1], (0.8562 + 0.9980) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(y.layer(2)[0], 6.1832, epsilon = 1e-12);
    }

    #[test]
    fn test_interp_within_keeps_clamped_classes() {
        use crate::params::AngleClass;
        let bounds = ParameterBounds::new(vec![
            AngleClass::new("gamma", 0.0, 10.0),
            AngleClass::new("beta", 0.0, 10.0),
        ]);
        let x = ParameterVector::new(vec![0.5, 1.0, 9.5, 3.0], 2).unwrap();
        assert_eq!(interp_within(&x, &bounds), interp(&x));
    }

    proptest! {
        #[test]
        fn prop_endpoints_kept_and_interior_bounded(
            rows in proptest::collection::vec(proptest::collection::vec(-5.0f64..5.0, 2), 1..8),
        ) {
            let p = rows.len();
            let flat: Vec<f64> = rows.iter().flatten().copied().collect();
            let x = ParameterVector::new(flat, 2).unwrap();
            let out = interp(&x).layers();
            let layers = x.layers();

            prop_assert_eq!(out.nrows(), p + 1);
            prop_assert_eq!(out.row(0), layers.row(0));
            prop_assert_eq!(out.row(p), layers.row(p - 1));
            for i in 2..=p {
                for k in 0..2 {
                    let lo = rows[i - 2][k].min(rows[i - 1][k]);
                    let hi = rows[i - 2][k].max(rows[i - 1][k]);
                    prop_assert!(out[[i - 1, k]] >= lo - 1e-12 && out[[i - 1, k]] <= hi + 1e-12);
                }
            }
        }

        #[test]
        fn prop_interp_within_stays_in_domain(
            layers in proptest::collection::vec((0.0f64..6.28, 0.0f64..3.14), 1..8),
        ) {
            let flat: Vec<f64> = layers.iter().flat_map(|&(g, b)| [g, b]).collect();
            let x = ParameterVector::new(flat, 2).unwrap();
            let bounds = ParameterBounds::standard();
            let y = interp_within(&x, &bounds);
            prop_assert_eq!(y.depth(), layers.len() + 1);
            for (i, &v) in y.as_slice().iter().enumerate() {
                let class = &bounds.classes()[i % 2];
                prop_assert!(v >= class.lower && v <= class.upper);
            }
        }

        #[test]
        fn prop_constant_schedule_is_fixed_point(v in -3.0f64..3.0, p in 1usize..10) {
            let x = ParameterVector::new(vec![v; 2 * p], 2).unwrap();
            let y = interp(&x);
            for &u in y.as_slice() {
                prop_assert!((u - v).abs() < 1e-12);
            }
        }
    }
}
