// src/models/gbm.rs
//! Geometric Brownian motion path simulation
//!
//! Brownian paths are built by cumulative summation of `√dt · Z` increments
//! with a leading zero row, then pushed through the Ito map
//! ```text
//! S_t = x0 * exp((r - δ - σ²/2) t + σ W_t)
//! ```
//! Ensembles are stored time-major: row `i` is time `t_i`, column `j` is
//! simulation `j`.

use crate::error::{validation::*, KlmcResult};
use crate::grid::TimeGrid;
use crate::rng::{self, RngFactory};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Parameters of the risk-neutral GBM underlying
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Initial price
    pub x0: f64,
    /// Risk-free rate
    pub r: f64,
    /// Continuous dividend yield
    pub delta: f64,
    /// Volatility
    pub sigma: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        GbmParams {
            x0: 100.0,
            r: 0.05,
            delta: 0.0,
            sigma: 0.2,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> KlmcResult<()> {
        validate_positive("x0", self.x0)?;
        validate_finite("x0", self.x0)?;
        validate_finite("r", self.r)?;
        validate_finite("delta", self.delta)?;
        validate_non_negative("sigma", self.sigma)?;
        validate_finite("sigma", self.sigma)?;
        Ok(())
    }

    /// Ito map from the Brownian value `w` at time `t` to the price
    #[inline]
    pub fn ito_map(&self, t: f64, w: f64) -> f64 {
        self.x0 * ((self.r - self.delta - 0.5 * self.sigma * self.sigma) * t + self.sigma * w).exp()
    }
}

/// Standard Brownian motion ensemble of shape `(N + 1, sims)`, first row zero
pub fn brownian_paths(grid: &TimeGrid, sims: usize, rng: &RngFactory) -> KlmcResult<Array2<f64>> {
    validate_paths("sims", sims)?;
    Ok(brownian_columns(grid, 0, sims, rng))
}

/// Columns `first..first + count` of a Brownian ensemble
///
/// Column `j` only depends on `rng.column_rng(j)`, so an ensemble built in
/// batches equals the one built at once.
pub fn brownian_columns(grid: &TimeGrid, first: usize, count: usize, rng: &RngFactory) -> Array2<f64> {
    let sqrt_dt = grid.dt().sqrt();
    let mut paths = Array2::<f64>::zeros((grid.len(), count));

    paths
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .for_each(|(j, mut column)| {
            let mut rng = rng.column_rng(first + j);
            let mut w = 0.0;
            for i in 1..column.len() {
                w += sqrt_dt * rng::get_normal_draw(&mut rng);
                column[i] = w;
            }
        });

    paths
}

/// Simulates underlying price paths under [`GbmParams`]
pub struct PathSimulator {
    pub params: GbmParams,
}

impl PathSimulator {
    pub fn new(params: GbmParams) -> KlmcResult<Self> {
        params.validate()?;
        Ok(PathSimulator { params })
    }

    /// Apply the Ito map elementwise to a Brownian ensemble, in place
    pub fn apply_ito_map(&self, grid: &TimeGrid, brownian: &mut Array2<f64>) {
        let params = self.params;
        brownian
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(grid.times().par_iter())
            .for_each(|(mut row, &t)| row.mapv_inplace(|w| params.ito_map(t, w)));
    }

    /// Price paths of shape `(N + 1, sims)`
    pub fn simulate(&self, grid: &TimeGrid, sims: usize, rng: &RngFactory) -> KlmcResult<Array2<f64>> {
        let mut paths = brownian_paths(grid, sims, rng)?;
        self.apply_ito_map(grid, &mut paths);
        Ok(paths)
    }

    /// Price path columns `first..first + count`
    pub fn simulate_columns(&self, grid: &TimeGrid, first: usize, count: usize, rng: &RngFactory) -> Array2<f64> {
        let mut paths = brownian_columns(grid, first, count, rng);
        self.apply_ito_map(grid, &mut paths);
        paths
    }
}
