// src/grid.rs
//! Uniform time grid and trapezoidal quadrature
//!
//! # Quadrature inner product
//!
//! For functions sampled on `t_i = i * dt`, `i = 0..=N`:
//! ```text
//! <f, g> = dt * Σ w_i f(t_i) g(t_i),   w = [1/2, 1, ..., 1, 1/2]
//! ```
//! which is the composite trapezoidal rule for `∫_0^T f(t) g(t) dt`.

use crate::error::{validation::*, KlmcError, KlmcResult};
use ndarray::{Array1, ArrayView1};

/// Uniform discretisation of `[0, T]` with `N` steps (`N + 1` points)
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    horizon: f64,
    steps: usize,
    dt: f64,
    times: Vec<f64>,
}

impl TimeGrid {
    pub fn new(horizon: f64, steps: usize) -> KlmcResult<Self> {
        validate_positive("horizon", horizon)?;
        validate_finite("horizon", horizon)?;
        validate_steps("steps", steps)?;

        let dt = horizon / steps as f64;
        let times = (0..=steps)
            .map(|i| if i == steps { horizon } else { i as f64 * dt })
            .collect();

        Ok(Self {
            horizon,
            steps,
            dt,
            times,
        })
    }

    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Number of grid points, `N + 1`
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Index of the grid point nearest `maturity`, if within `tolerance`
    pub fn locate(&self, maturity: f64, tolerance: f64) -> KlmcResult<usize> {
        validate_finite("maturity", maturity)?;
        let raw = (maturity / self.dt).round();
        let idx = raw.clamp(0.0, self.steps as f64) as usize;
        let nearest = self.times[idx];
        if (nearest - maturity).abs() > tolerance {
            return Err(KlmcError::MaturityLookup {
                maturity,
                nearest,
                tolerance,
            });
        }
        Ok(idx)
    }
}

/// Trapezoidal weights attached to a [`TimeGrid`]
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureWeights {
    weights: Array1<f64>,
    dt: f64,
}

impl QuadratureWeights {
    pub fn trapezoidal(grid: &TimeGrid) -> Self {
        let n = grid.len();
        let mut weights = Array1::from_elem(n, 1.0);
        weights[0] = 0.5;
        weights[n - 1] = 0.5;
        Self {
            weights,
            dt: grid.dt(),
        }
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// `dt * Σ w_i`, equal to the grid horizon
    pub fn total_mass(&self) -> f64 {
        self.weights.sum() * self.dt
    }

    /// Quadrature inner product of two sampled functions
    pub fn inner(&self, f: ArrayView1<f64>, g: ArrayView1<f64>) -> KlmcResult<f64> {
        if f.len() != self.len() || g.len() != self.len() {
            return Err(KlmcError::ShapeMismatch {
                context: "quadrature inner product".to_string(),
                expected: (self.len(), self.len()),
                actual: (f.len(), g.len()),
            });
        }
        Ok(self.dt
            * self
                .weights
                .iter()
                .zip(f.iter().zip(g.iter()))
                .map(|(w, (a, b))| w * a * b)
                .sum::<f64>())
    }

    /// Quadrature L² norm
    pub fn norm(&self, f: ArrayView1<f64>) -> KlmcResult<f64> {
        Ok(self.inner(f, f)?.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    #[test]
    fn test_grid_points() {
        let grid = TimeGrid::new(1.0, 4).unwrap();
        assert_eq!(grid.len(), 5);
        assert_eq!(grid.times(), &[0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(TimeGrid::new(0.0, 4).is_err());
        assert!(TimeGrid::new(1.0, 0).is_err());
    }

    #[test]
    fn test_total_mass_equals_horizon() {
        for &(t, n) in &[(1.0, 4), (2.5, 100), (0.3, 7)] {
            let grid = TimeGrid::new(t, n).unwrap();
            let w = QuadratureWeights::trapezoidal(&grid);
            assert_abs_diff_eq!(w.total_mass(), t, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inner_product_integrates_linear_exactly() {
        let grid = TimeGrid::new(2.0, 10).unwrap();
        let w = QuadratureWeights::trapezoidal(&grid);
        let f = Array1::from(grid.times().to_vec());
        let one = Array1::from_elem(grid.len(), 1.0);
        // ∫_0^2 t dt = 2
        assert_abs_diff_eq!(w.inner(f.view(), one.view()).unwrap(), 2.0, epsilon = 1e-12);
        assert!(w.inner(f.view(), Array1::zeros(3).view()).is_err());
    }

    #[test]
    fn test_locate_with_tolerance() {
        let grid = TimeGrid::new(1.0, 100).unwrap();
        assert_eq!(grid.locate(0.25, 1e-9).unwrap(), 25);
        assert_eq!(grid.locate(1.0, 1e-9).unwrap(), 100);
        assert_eq!(grid.locate(0.0, 1e-9).unwrap(), 0);
        assert!(matches!(
            grid.locate(0.255, 1e-9),
            Err(KlmcError::MaturityLookup { .. })
        ));
        assert!(grid.locate(1.5, 1e-9).is_err());
    }
}
