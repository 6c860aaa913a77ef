// src/kl/model.rs
//! Offline phase: fitting the reduced model of each functional
//!
//! A [`TrainedModel`] bundles everything the online phase needs for one
//! functional: the interpolated mean function, the interpolated
//! eigenfunctions and one quantile function per retained coefficient.
//! Models are immutable once built and are handed around as
//! `Arc<TrainedModel>`; aliased functionals share the same handle.

use super::interp::{interpolate_columns, LinearInterpolant};
use super::quantile::{QuantileFunction, DEFAULT_DEGENERATE_TOLERANCE, DEFAULT_QUANTILE_POINTS};
use super::solver::{KarhunenLoeveSolver, KlDecomposition, DEFAULT_IMAGINARY_TOLERANCE};
use crate::error::{KlmcError, KlmcResult};
use crate::functionals::{FunctionalKind, FunctionalRegistry};
use crate::grid::{QuadratureWeights, TimeGrid};
use ndarray::ArrayView2;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Per-functional training parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSettings {
    /// Truncation level K
    pub truncation: usize,
    pub quantile_points: usize,
    pub degenerate_tolerance: f64,
    pub imaginary_tolerance: f64,
}

impl TrainingSettings {
    pub fn new(truncation: usize) -> Self {
        Self {
            truncation,
            quantile_points: DEFAULT_QUANTILE_POINTS,
            degenerate_tolerance: DEFAULT_DEGENERATE_TOLERANCE,
            imaginary_tolerance: DEFAULT_IMAGINARY_TOLERANCE,
        }
    }
}

/// Reduced model of one functional
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub kind: FunctionalKind,
    pub horizon: f64,
    pub mean: LinearInterpolant,
    pub basis: Vec<LinearInterpolant>,
    pub quantiles: Vec<QuantileFunction>,
    /// Retained eigenvalues, descending
    pub eigenvalues: Vec<f64>,
    pub captured_variance: f64,
}

impl TrainedModel {
    /// Fit a model to functional paths sampled on `grid`
    pub fn train(
        kind: FunctionalKind,
        functional_paths: ArrayView2<f64>,
        grid: &TimeGrid,
        weights: &QuadratureWeights,
        settings: &TrainingSettings,
    ) -> KlmcResult<Self> {
        let decomposition = KarhunenLoeveSolver::new(settings.truncation)
            .with_imaginary_tolerance(settings.imaginary_tolerance)
            .fit(functional_paths, weights)?;
        Self::from_decomposition(kind, &decomposition, grid, settings)
    }

    pub fn from_decomposition(
        kind: FunctionalKind,
        decomposition: &KlDecomposition,
        grid: &TimeGrid,
        settings: &TrainingSettings,
    ) -> KlmcResult<Self> {
        let times = grid.times();
        let mean = LinearInterpolant::from_view(times, decomposition.mean.view())?;
        let basis = interpolate_columns(times, &decomposition.basis)?;
        let quantiles = decomposition
            .coefficients
            .rows()
            .into_iter()
            .enumerate()
            .map(|(k, row)| {
                QuantileFunction::fit(row, settings.quantile_points, settings.degenerate_tolerance, k)
            })
            .collect::<KlmcResult<Vec<_>>>()?;

        Ok(Self {
            kind,
            horizon: grid.horizon(),
            mean,
            basis,
            quantiles,
            eigenvalues: decomposition
                .eigenvalues
                .iter()
                .take(decomposition.truncation())
                .copied()
                .collect(),
            captured_variance: decomposition.captured_variance(),
        })
    }

    pub fn truncation(&self) -> usize {
        self.basis.len()
    }
}

/// Outcome of the offline phase, one entry per registered name
pub type TrainingOutcome = BTreeMap<String, KlmcResult<Arc<TrainedModel>>>;

/// Train every source functional of `registry` on one price ensemble
///
/// Each source is trained independently; a failure only affects that
/// source and the names aliasing it. Aliases receive a clone of the
/// source's `Arc`, never a copy of the model.
pub fn train_all(
    registry: &FunctionalRegistry,
    price_paths: ArrayView2<f64>,
    grid: &TimeGrid,
    settings: &BTreeMap<String, TrainingSettings>,
) -> TrainingOutcome {
    let weights = QuadratureWeights::trapezoidal(grid);
    let mut outcome = TrainingOutcome::new();

    for entry in registry.sources() {
        let result = settings
            .get(&entry.name)
            .ok_or_else(|| KlmcError::InvalidConfiguration {
                field: entry.name.clone(),
                reason: "no truncation level configured".to_string(),
            })
            .and_then(|s| {
                let functional = entry.kind.apply(price_paths)?;
                TrainedModel::train(entry.kind, functional.view(), grid, &weights, s)
            })
            .map(Arc::new);

        match &result {
            Ok(model) => info!(
                functional = %entry.name,
                truncation = model.truncation(),
                captured_variance = model.captured_variance,
                "offline model trained"
            ),
            Err(e) => error!(functional = %entry.name, error = %e, "offline training failed"),
        }
        outcome.insert(entry.name.clone(), result);
    }

    for entry in registry.entries().iter().filter(|e| e.alias_of.is_some()) {
        let target = entry.alias_of.as_deref().unwrap_or_default();
        let shared = match outcome.get(target) {
            Some(Ok(model)) => Ok(Arc::clone(model)),
            _ => Err(KlmcError::InvalidConfiguration {
                field: entry.name.clone(),
                reason: format!("alias target '{}' has no trained model", target),
            }),
        };
        outcome.insert(entry.name.clone(), shared);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::gbm::{GbmParams, PathSimulator};
    use crate::rng::RngFactory;

    fn price_paths(grid: &TimeGrid, sims: usize) -> ndarray::Array2<f64> {
        PathSimulator::new(GbmParams::default())
            .unwrap()
            .simulate(grid, sims, &RngFactory::new(3))
            .unwrap()
    }

    #[test]
    fn test_train_builds_one_quantile_per_basis_function() {
        let grid = TimeGrid::new(1.0, 20).unwrap();
        let weights = QuadratureWeights::trapezoidal(&grid);
        let paths = price_paths(&grid, 2_000);
        let model = TrainedModel::train(
            FunctionalKind::RunningAverage,
            paths.view(),
            &grid,
            &weights,
            &TrainingSettings::new(4),
        )
        .unwrap();

        assert_eq!(model.truncation(), 4);
        assert_eq!(model.quantiles.len(), 4);
        assert_eq!(model.eigenvalues.len(), 4);
        assert!(model.captured_variance > 0.95 && model.captured_variance <= 1.0);
        // mean function starts at x0 for every functional
        assert!((model.mean.value(0.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_alias_shares_handle() {
        let grid = TimeGrid::new(1.0, 10).unwrap();
        let paths = price_paths(&grid, 1_000);
        let mut registry = FunctionalRegistry::new();
        registry.register("Lookback", FunctionalKind::RunningMax).unwrap();
        registry.register_alias("UpAndOut", "Lookback").unwrap();

        let mut settings = BTreeMap::new();
        settings.insert("Lookback".to_string(), TrainingSettings::new(3));
        let outcome = train_all(&registry, paths.view(), &grid, &settings);

        let a = outcome["Lookback"].as_ref().unwrap();
        let b = outcome["UpAndOut"].as_ref().unwrap();
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn test_failures_are_isolated() {
        let grid = TimeGrid::new(1.0, 4).unwrap();
        let paths = price_paths(&grid, 500);
        let mut registry = FunctionalRegistry::new();
        registry.register("Asian", FunctionalKind::RunningAverage).unwrap();
        registry.register("Lookback", FunctionalKind::RunningMax).unwrap();
        registry.register_alias("UpAndOut", "Lookback").unwrap();

        let mut settings = BTreeMap::new();
        settings.insert("Asian".to_string(), TrainingSettings::new(2));
        // 5 grid points, K = 9 is beyond the rank
        settings.insert("Lookback".to_string(), TrainingSettings::new(9));
        let outcome = train_all(&registry, paths.view(), &grid, &settings);

        assert!(outcome["Asian"].is_ok());
        assert!(matches!(outcome["Lookback"], Err(KlmcError::NumericalRank { .. })));
        assert!(outcome["UpAndOut"].is_err());
    }
}
