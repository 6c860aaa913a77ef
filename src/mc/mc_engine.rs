// src/mc/mc_engine.rs
//! Standard Monte Carlo on full discretised paths
//!
//! Simulates GBM paths on an `N`-step grid, applies the functional along the
//! whole path and reads its values at the grid points matching the requested
//! maturities. This is the reference the KLMC estimates are compared with,
//! and at a large `N` the benchmark itself.

use crate::error::{validation::*, KlmcResult};
use crate::functionals::FunctionalKind;
use crate::grid::TimeGrid;
use crate::mc::aggregator::{PriceAggregator, PriceSurface};
use crate::mc::payoffs::Payoff;
use crate::models::gbm::{GbmParams, PathSimulator};
use crate::rng::RngFactory;
use ndarray::{s, Array2, ArrayView2, Axis};
use tracing::debug;

/// Default tolerance when matching maturities to grid points
pub const DEFAULT_MATURITY_TOLERANCE: f64 = 1e-8;

/// Simulation columns generated per batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
pub struct McConfig {
    pub params: GbmParams,
    pub horizon: f64,
    pub steps: usize,
    pub sims: usize,
    pub seed: u64,
    pub maturity_tolerance: f64,
}

impl McConfig {
    /// Validate the Monte Carlo configuration
    pub fn validate(&self) -> KlmcResult<()> {
        self.params.validate()?;
        validate_positive("horizon", self.horizon)?;
        validate_steps("steps", self.steps)?;
        validate_paths("sims", self.sims)?;
        validate_non_negative("maturity_tolerance", self.maturity_tolerance)?;
        Ok(())
    }

    pub fn grid(&self) -> KlmcResult<TimeGrid> {
        TimeGrid::new(self.horizon, self.steps)
    }
}

impl Default for McConfig {
    fn default() -> Self {
        McConfig {
            params: GbmParams::default(),
            horizon: 1.0,
            steps: 100,
            sims: 100_000,
            seed: 12345,
            maturity_tolerance: DEFAULT_MATURITY_TOLERANCE,
        }
    }
}

/// Grid row of each maturity, failing on the first one off the grid
pub fn maturity_indices(grid: &TimeGrid, maturities: &[f64], tolerance: f64) -> KlmcResult<Vec<usize>> {
    maturities.iter().map(|&m| grid.locate(m, tolerance)).collect()
}

/// Rows of a `(time, sims)` functional ensemble at the given grid indices
pub fn select_rows(functional: ArrayView2<f64>, indices: &[usize]) -> Array2<f64> {
    functional.select(Axis(0), indices)
}

/// Values of several functionals at grid rows `indices`, one
/// `(indices.len(), sims)` matrix per kind
///
/// Paths are generated in batches of `batch_size` columns so that only the
/// selected rows are kept for the whole ensemble.
pub fn mc_functional_values(
    simulator: &PathSimulator,
    grid: &TimeGrid,
    kinds: &[FunctionalKind],
    sims: usize,
    indices: &[usize],
    rng: &RngFactory,
    batch_size: usize,
) -> KlmcResult<Vec<Array2<f64>>> {
    validate_paths("sims", sims)?;
    let batch_size = batch_size.max(1);
    let mut values: Vec<Array2<f64>> = kinds
        .iter()
        .map(|_| Array2::zeros((indices.len(), sims)))
        .collect();

    let mut first = 0;
    while first < sims {
        let count = batch_size.min(sims - first);
        let paths = simulator.simulate_columns(grid, first, count, rng);
        for (kind, out) in kinds.iter().zip(values.iter_mut()) {
            let functional = kind.apply(paths.view())?;
            out.slice_mut(s![.., first..first + count])
                .assign(&select_rows(functional.view(), indices));
        }
        first += count;
    }
    Ok(values)
}

/// Standard MC price surface for one functional
pub fn mc_price_surface(
    cfg: &McConfig,
    kind: FunctionalKind,
    payoff: Payoff,
    levels: &[f64],
    maturities: &[f64],
) -> KlmcResult<PriceSurface> {
    cfg.validate()?;
    let grid = cfg.grid()?;
    let indices = maturity_indices(&grid, maturities, cfg.maturity_tolerance)?;
    let aggregator = PriceAggregator::new(payoff, cfg.params.r, cfg.params.x0)?;

    let simulator = PathSimulator::new(cfg.params)?;
    let values = mc_functional_values(
        &simulator,
        &grid,
        &[kind],
        cfg.sims,
        &indices,
        &RngFactory::new(cfg.seed),
        DEFAULT_BATCH_SIZE,
    )?
    .remove(0);
    debug!(steps = cfg.steps, sims = cfg.sims, ?kind, "standard MC values ready");

    aggregator.price_surface(values.view(), maturities, levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::bs_analytic::bs_call_price_with_dividend;
    use crate::error::KlmcError;

    #[test]
    fn test_european_matches_black_scholes() {
        let cfg = McConfig {
            params: GbmParams {
                x0: 100.0,
                r: 0.03,
                delta: 0.01,
                sigma: 0.2,
            },
            steps: 4,
            sims: 100_000,
            seed: 42,
            ..Default::default()
        };
        let surface = mc_price_surface(
            &cfg,
            FunctionalKind::Identity,
            Payoff::Vanilla,
            &[0.9, 1.0, 1.1],
            &[0.5, 1.0],
        )
        .unwrap();

        for (l, &m) in [0.9, 1.0, 1.1].iter().enumerate() {
            for (t, &tau) in [0.5, 1.0].iter().enumerate() {
                let exact = bs_call_price_with_dividend(100.0, m * 100.0, 0.03, 0.01, 0.2, tau);
                let se = surface.std_errors[[l, t]];
                assert!(
                    (surface.price(l, t) - exact).abs() < 4.0 * se,
                    "m = {}, τ = {}: {} vs {} (se {})",
                    m,
                    tau,
                    surface.price(l, t),
                    exact,
                    se
                );
            }
        }
    }

    #[test]
    fn test_off_grid_maturity_fails_before_simulating() {
        let cfg = McConfig {
            steps: 4,
            sims: 10,
            ..Default::default()
        };
        let result = mc_price_surface(&cfg, FunctionalKind::RunningMax, Payoff::Vanilla, &[1.0], &[0.3]);
        assert!(matches!(result, Err(KlmcError::MaturityLookup { .. })));
    }

    #[test]
    fn test_batching_does_not_change_values() {
        let simulator = PathSimulator::new(GbmParams::default()).unwrap();
        let grid = TimeGrid::new(1.0, 10).unwrap();
        let indices = maturity_indices(&grid, &[0.5, 1.0], 1e-9).unwrap();
        let kinds = [FunctionalKind::RunningAverage, FunctionalKind::RunningMax];
        let rng = RngFactory::new(77);
        let batched = mc_functional_values(&simulator, &grid, &kinds, 25, &indices, &rng, 7).unwrap();
        let whole = mc_functional_values(&simulator, &grid, &kinds, 25, &indices, &rng, 100).unwrap();
        assert_eq!(batched, whole);

        let paths = simulator.simulate(&grid, 25, &rng).unwrap();
        let max = FunctionalKind::RunningMax.apply(paths.view()).unwrap();
        assert_eq!(batched[1], select_rows(max.view(), &indices));
    }

    #[test]
    fn test_select_rows() {
        let grid = TimeGrid::new(1.0, 4).unwrap();
        let idx = maturity_indices(&grid, &[0.25, 1.0], 1e-9).unwrap();
        assert_eq!(idx, vec![1, 4]);
        let ensemble = Array2::from_shape_fn((5, 3), |(i, j)| (10 * i + j) as f64);
        let rows = select_rows(ensemble.view(), &idx);
        assert_eq!(rows.row(0).to_vec(), vec![10.0, 11.0, 12.0]);
        assert_eq!(rows.row(1).to_vec(), vec![40.0, 41.0, 42.0]);
    }
}
