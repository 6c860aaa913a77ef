// src/kl/sampler.rs
//! Online phase: sampling functional values at maturities
//!
//! For every simulation `j` and retained index `k`, draw `U_jk ~ U(0,1)` and
//! set `ξ_jk = Q_k(U_jk)`. The functional value at maturity `τ` is then
//! ```text
//! Ŷ_j(τ) = μ(τ) + Σ_k φ_k(τ) ξ_jk
//! ```
//! Coefficients are drawn independently across `k`; only their marginal
//! laws are reproduced. Only the requested maturities are evaluated, so the
//! cost is `O(J · K · #maturities)` whatever the training grid resolution.

use super::model::TrainedModel;
use crate::error::{validation::*, KlmcError, KlmcResult};
use crate::rng::{self, RngFactory};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Axis};

/// Draws reconstructed functional values from a [`TrainedModel`]
pub struct KlmcSampler<'a> {
    model: &'a TrainedModel,
}

impl<'a> KlmcSampler<'a> {
    pub fn new(model: &'a TrainedModel) -> Self {
        Self { model }
    }

    fn check_maturities(&self, maturities: &[f64]) -> KlmcResult<()> {
        if maturities.is_empty() {
            return Err(KlmcError::InvalidConfiguration {
                field: "maturities".to_string(),
                reason: "at least one maturity is required".to_string(),
            });
        }
        let (start, end) = self.model.mean.domain();
        for &m in maturities {
            validate_finite("maturity", m)?;
            if m < start || m > end * (1.0 + 1e-12) {
                return Err(KlmcError::MaturityOutOfRange {
                    maturity: m,
                    horizon: end,
                });
            }
        }
        Ok(())
    }

    /// Value matrix of shape `(maturities, sims)`
    pub fn sample(&self, maturities: &[f64], sims: usize, rng: &RngFactory) -> KlmcResult<Array2<f64>> {
        validate_paths("sims", sims)?;
        self.check_maturities(maturities)?;

        let mean_at: Array1<f64> = self.model.mean.values(maturities);
        // phi_at[[k, m]] = φ_k(τ_m)
        let k_max = self.model.truncation();
        let mut phi_at = Array2::<f64>::zeros((k_max, maturities.len()));
        for (k, phi) in self.model.basis.iter().enumerate() {
            phi_at.row_mut(k).assign(&phi.values(maturities));
        }

        let quantiles = &self.model.quantiles;
        let mut values = Array2::<f64>::zeros((maturities.len(), sims));
        values
            .axis_iter_mut(Axis(1))
            .into_par_iter()
            .enumerate()
            .for_each(|(j, mut column)| {
                let mut rng = rng.column_rng(j);
                column.assign(&mean_at);
                for (k, q) in quantiles.iter().enumerate() {
                    let xi = q.value(rng::get_uniform_draw(&mut rng));
                    column.scaled_add(xi, &phi_at.row(k));
                }
            });

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functionals::FunctionalKind;
    use crate::grid::{QuadratureWeights, TimeGrid};
    use crate::kl::model::TrainingSettings;
    use crate::models::gbm::{GbmParams, PathSimulator};

    fn trained(kind: FunctionalKind, k: usize) -> TrainedModel {
        let grid = TimeGrid::new(1.0, 20).unwrap();
        let weights = QuadratureWeights::trapezoidal(&grid);
        let paths = PathSimulator::new(GbmParams::default())
            .unwrap()
            .simulate(&grid, 5_000, &RngFactory::new(21))
            .unwrap();
        let functional = kind.apply(paths.view()).unwrap();
        TrainedModel::train(kind, functional.view(), &grid, &weights, &TrainingSettings::new(k)).unwrap()
    }

    #[test]
    fn test_sample_shape_and_reproducibility() {
        let model = trained(FunctionalKind::Identity, 3);
        let sampler = KlmcSampler::new(&model);
        let maturities = [0.1, 0.37, 1.0];
        let a = sampler.sample(&maturities, 1_000, &RngFactory::new(5)).unwrap();
        let b = sampler.sample(&maturities, 1_000, &RngFactory::new(5)).unwrap();
        assert_eq!(a.dim(), (3, 1_000));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_mean_tracks_mean_function() {
        let model = trained(FunctionalKind::RunningAverage, 4);
        let sampler = KlmcSampler::new(&model);
        let values = sampler.sample(&[0.5, 1.0], 20_000, &RngFactory::new(8)).unwrap();
        for (m, &tau) in [0.5, 1.0].iter().enumerate() {
            let sample_mean = values.row(m).mean().unwrap();
            let target = model.mean.value(tau);
            assert!(
                (sample_mean - target).abs() < 0.01 * target,
                "τ = {}: {} vs {}",
                tau,
                sample_mean,
                target
            );
        }
    }

    #[test]
    fn test_maturity_outside_horizon_rejected() {
        let model = trained(FunctionalKind::Identity, 1);
        let sampler = KlmcSampler::new(&model);
        assert!(matches!(
            sampler.sample(&[1.5], 100, &RngFactory::new(1)),
            Err(KlmcError::MaturityOutOfRange { .. })
        ));
        assert!(sampler.sample(&[], 100, &RngFactory::new(1)).is_err());
    }

    #[test]
    fn test_maturity_bounds_follow_mean_domain() {
        let model = trained(FunctionalKind::Identity, 1);
        assert_eq!(model.mean.domain(), (0.0, model.horizon));
        let sampler = KlmcSampler::new(&model);

        let values = sampler.sample(&[0.0, model.horizon], 50, &RngFactory::new(2)).unwrap();
        assert_eq!(values.dim(), (2, 50));
        for m in [-1e-9, model.horizon + 1e-6] {
            assert!(
                matches!(
                    sampler.sample(&[m], 50, &RngFactory::new(2)),
                    Err(KlmcError::MaturityOutOfRange { horizon, .. }) if horizon == model.horizon
                ),
                "maturity {} accepted",
                m
            );
        }
    }
}
