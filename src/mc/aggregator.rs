// src/mc/aggregator.rs
//! Discounted Monte Carlo price surfaces
//!
//! Given a `(maturity, simulation)` matrix of functional values, each cell
//! `(level, maturity)` of the surface is
//! ```text
//! e^{-r τ} · (1/J) Σ_j payoff(Y_j(τ), level)
//! ```
//! together with its standard error.

use crate::error::{validation::*, KlmcError, KlmcResult};
use crate::math_utils::mean_and_std_error;
use crate::mc::payoffs::Payoff;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Prices indexed by `(level, maturity)`
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSurface {
    pub levels: Vec<f64>,
    pub maturities: Vec<f64>,
    /// Shape `(levels, maturities)`
    pub prices: Array2<f64>,
    /// Standard error of each price, same shape
    pub std_errors: Array2<f64>,
}

impl PriceSurface {
    pub fn dim(&self) -> (usize, usize) {
        self.prices.dim()
    }

    pub fn price(&self, level: usize, maturity: usize) -> f64 {
        self.prices[[level, maturity]]
    }
}

/// Prices a payoff over a grid of levels from pre-computed functional values
#[derive(Debug, Clone, Copy)]
pub struct PriceAggregator {
    pub payoff: Payoff,
    pub r: f64,
    pub x0: f64,
}

impl PriceAggregator {
    pub fn new(payoff: Payoff, r: f64, x0: f64) -> KlmcResult<Self> {
        validate_finite("r", r)?;
        validate_positive("x0", x0)?;
        Ok(Self { payoff, r, x0 })
    }

    /// Surface for `values` of shape `(maturities.len(), sims)`
    pub fn price_surface(
        &self,
        values: ArrayView2<f64>,
        maturities: &[f64],
        levels: &[f64],
    ) -> KlmcResult<PriceSurface> {
        if values.nrows() != maturities.len() || values.ncols() == 0 {
            return Err(KlmcError::ShapeMismatch {
                context: "price aggregation: values vs maturities".to_string(),
                expected: (maturities.len(), values.ncols().max(1)),
                actual: values.dim(),
            });
        }
        for &level in levels {
            validate_finite("level", level)?;
        }

        let n_mat = maturities.len();
        let cells: Vec<(f64, f64)> = (0..levels.len() * n_mat)
            .into_par_iter()
            .map(|cell| {
                let (l, m) = (cell / n_mat, cell % n_mat);
                let discount = (-self.r * maturities[m]).exp();
                let (mean, se) = mean_and_std_error(
                    values
                        .row(m)
                        .iter()
                        .map(|&y| self.payoff.calculate(y, levels[l], self.x0)),
                );
                (discount * mean, discount * se)
            })
            .collect();

        let prices = Array2::from_shape_fn((levels.len(), n_mat), |(l, m)| cells[l * n_mat + m].0);
        let std_errors =
            Array2::from_shape_fn((levels.len(), n_mat), |(l, m)| cells[l * n_mat + m].1);

        if let Some(bad) = prices.iter().find(|p| !p.is_finite()) {
            return Err(KlmcError::NumericalInstability {
                method: "price aggregation".to_string(),
                reason: format!("price estimate is not finite: {}", bad),
            });
        }

        Ok(PriceSurface {
            levels: levels.to_vec(),
            maturities: maturities.to_vec(),
            prices,
            std_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_surface_values() {
        // two maturities, four simulations
        let values = array![[90.0, 100.0, 110.0, 120.0], [80.0, 100.0, 120.0, 140.0]];
        let agg = PriceAggregator::new(Payoff::Vanilla, 0.0, 100.0).unwrap();
        let surface = agg
            .price_surface(values.view(), &[0.5, 1.0], &[1.0, 1.1, 1.5])
            .unwrap();
        assert_eq!(surface.dim(), (3, 2));
        assert_abs_diff_eq!(surface.price(0, 0), 7.5, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.price(0, 1), 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.price(1, 1), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(surface.price(2, 0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_discounting() {
        let values = array![[110.0, 110.0]];
        let agg = PriceAggregator::new(Payoff::Vanilla, 0.05, 100.0).unwrap();
        let surface = agg.price_surface(values.view(), &[2.0], &[1.0]).unwrap();
        assert_abs_diff_eq!(surface.price(0, 0), 10.0 * (-0.1f64).exp(), epsilon = 1e-12);
        assert_eq!(surface.std_errors[[0, 0]], 0.0);
    }

    #[test]
    fn test_digital_surface_in_unit_interval() {
        let values = array![[100.0, 125.0, 130.0, 105.0]];
        let agg = PriceAggregator::new(Payoff::DigitalBarrier, 0.01, 100.0).unwrap();
        let surface = agg.price_surface(values.view(), &[1.0], &[1.1, 1.2, 1.3]).unwrap();
        for &p in surface.prices.iter() {
            assert!((0.0..=1.0).contains(&p));
        }
        assert_abs_diff_eq!(surface.price(0, 0), 0.5 * (-0.01f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_shape_mismatch() {
        let values = array![[1.0, 2.0]];
        let agg = PriceAggregator::new(Payoff::Vanilla, 0.0, 1.0).unwrap();
        assert!(matches!(
            agg.price_surface(values.view(), &[0.5, 1.0], &[1.0]),
            Err(KlmcError::ShapeMismatch { .. })
        ));
    }
}
