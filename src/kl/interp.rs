// src/kl/interp.rs
//! Continuous-time extension of discretely sampled functions
//!
//! Mean and eigenfunctions are fitted on the training grid only; the online
//! phase evaluates them at arbitrary maturities through piecewise-linear
//! interpolation. Queries outside the node range take the endpoint value.

use crate::error::{KlmcError, KlmcResult};
use ndarray::{Array1, Array2, ArrayView1};

/// Piecewise-linear interpolant over strictly increasing nodes
#[derive(Debug, Clone, PartialEq)]
pub struct LinearInterpolant {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearInterpolant {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> KlmcResult<Self> {
        if xs.len() != ys.len() || xs.is_empty() {
            return Err(KlmcError::ShapeMismatch {
                context: "linear interpolant nodes".to_string(),
                expected: (xs.len(), xs.len()),
                actual: (xs.len(), ys.len()),
            });
        }
        if xs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(KlmcError::InvalidConfiguration {
                field: "interpolation nodes".to_string(),
                reason: "x must be strictly increasing".to_string(),
            });
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(KlmcError::InvalidConfiguration {
                field: "interpolation nodes".to_string(),
                reason: "x and y must be finite".to_string(),
            });
        }
        Ok(Self { xs, ys })
    }

    pub fn from_view(xs: &[f64], ys: ArrayView1<f64>) -> KlmcResult<Self> {
        Self::new(xs.to_vec(), ys.to_vec())
    }

    pub fn x(&self) -> &[f64] {
        &self.xs
    }

    pub fn y(&self) -> &[f64] {
        &self.ys
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Value at `x`
    pub fn value(&self, x: f64) -> f64 {
        let last = self.xs.len() - 1;
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[last] {
            return self.ys[last];
        }
        let idx = self.xs.partition_point(|v| *v <= x).clamp(1, last);
        let (x0, x1) = (self.xs[idx - 1], self.xs[idx]);
        let (y0, y1) = (self.ys[idx - 1], self.ys[idx]);
        let w = (x - x0) / (x1 - x0);
        y0 + w * (y1 - y0)
    }

    /// Values at each of `xs`
    pub fn values(&self, xs: &[f64]) -> Array1<f64> {
        xs.iter().map(|&x| self.value(x)).collect()
    }

    /// Borrowing closure view, `t ↦ value(t)`
    pub fn as_fn(&self) -> impl Fn(f64) -> f64 + '_ {
        move |x| self.value(x)
    }
}

/// Interpolate each column of a `(grid points, K)` basis matrix
pub fn interpolate_columns(times: &[f64], basis: &Array2<f64>) -> KlmcResult<Vec<LinearInterpolant>> {
    if basis.nrows() != times.len() {
        return Err(KlmcError::ShapeMismatch {
            context: "basis vs time grid".to_string(),
            expected: (times.len(), basis.ncols()),
            actual: basis.dim(),
        });
    }
    basis
        .columns()
        .into_iter()
        .map(|col| LinearInterpolant::from_view(times, col))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_hits_nodes_and_midpoints() {
        let f = LinearInterpolant::new(vec![0.0, 0.5, 1.0], vec![1.0, 3.0, 2.0]).unwrap();
        assert_abs_diff_eq!(f.value(0.0), 1.0);
        assert_abs_diff_eq!(f.value(0.5), 3.0);
        assert_abs_diff_eq!(f.value(1.0), 2.0);
        assert_abs_diff_eq!(f.value(0.25), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.value(0.75), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_extrapolation() {
        let f = LinearInterpolant::new(vec![0.0, 1.0], vec![4.0, 6.0]).unwrap();
        assert_eq!(f.value(-1.0), 4.0);
        assert_eq!(f.value(2.0), 6.0);
        let g = f.as_fn();
        assert_abs_diff_eq!(g(0.5), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_bad_nodes() {
        assert!(LinearInterpolant::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(LinearInterpolant::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(LinearInterpolant::new(vec![], vec![]).is_err());
        assert!(LinearInterpolant::new(vec![0.0, 1.0], vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_interpolate_columns() {
        let times = [0.0, 1.0, 2.0];
        let basis = array![[0.0, 1.0], [1.0, 1.0], [2.0, 0.0]];
        let fs = interpolate_columns(&times, &basis).unwrap();
        assert_eq!(fs.len(), 2);
        assert_abs_diff_eq!(fs[0].value(1.5), 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fs[1].value(1.5), 0.5, epsilon = 1e-12);
        assert!(interpolate_columns(&[0.0, 1.0], &basis).is_err());
    }
}
