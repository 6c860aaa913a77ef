// src/config.rs
//! Experiment configuration
//!
//! Loaded from TOML; every field has a default reproducing the reference
//! experiment (T = 1, Asian / Lookback / up-and-out / European functionals).
//!
//! ```toml
//! horizon = 1.0
//! offline_steps = 100
//! online_steps = 100
//! online_sims = [1000, 10000]
//!
//! [model]
//! x0 = 100.0
//! r = 0.05
//! delta = 0.0
//! sigma = 0.2
//!
//! [[functionals]]
//! name = "Lookback"
//! kind = "running_max"
//! payoff = "vanilla"
//! levels = [1.0, 1.1, 1.2]
//! truncation = 10
//!
//! [[functionals]]
//! name = "UpAndOut"
//! kind = "running_max"
//! payoff = "digital_barrier"
//! levels = [1.2, 1.3]
//! alias_of = "Lookback"
//! ```

use crate::error::{validation::*, KlmcError, KlmcResult};
use crate::functionals::{FunctionalKind, FunctionalRegistry};
use crate::kl::model::TrainingSettings;
use crate::kl::quantile::{DEFAULT_DEGENERATE_TOLERANCE, DEFAULT_QUANTILE_POINTS};
use crate::kl::solver::DEFAULT_IMAGINARY_TOLERANCE;
use crate::mc::mc_engine::DEFAULT_MATURITY_TOLERANCE;
use crate::mc::payoffs::Payoff;
use crate::models::gbm::GbmParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One named functional with its payoff and level grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionalConfig {
    pub name: String,
    pub kind: FunctionalKind,
    pub payoff: Payoff,
    /// Moneyness or barrier levels, as multiples of x0
    pub levels: Vec<f64>,
    /// Truncation level K; required unless `alias_of` is set
    #[serde(default)]
    pub truncation: Option<usize>,
    /// Reuse the functional paths and trained model of another entry
    #[serde(default)]
    pub alias_of: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub horizon: f64,
    /// Step count of the offline (training) grid
    pub offline_steps: usize,
    /// Step count of standard MC runs
    pub online_steps: usize,
    /// Benchmark MC uses `online_steps * benchmark_multiplier` steps
    pub benchmark_multiplier: usize,
    pub seed: u64,
    pub offline_sims: usize,
    pub online_sims: Vec<usize>,
    pub benchmark_sims: usize,
    pub quantile_points: usize,
    pub maturities: Vec<f64>,
    pub maturity_tolerance: f64,
    pub degenerate_tolerance: f64,
    pub imaginary_tolerance: f64,
    pub model: GbmParams,
    pub functionals: Vec<FunctionalConfig>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            horizon: 1.0,
            offline_steps: 100,
            online_steps: 100,
            benchmark_multiplier: 10,
            seed: 12345,
            offline_sims: 10_000,
            online_sims: vec![1_000, 10_000, 100_000],
            benchmark_sims: 100_000,
            quantile_points: DEFAULT_QUANTILE_POINTS,
            maturities: vec![0.25, 0.5, 0.75, 1.0],
            maturity_tolerance: DEFAULT_MATURITY_TOLERANCE,
            degenerate_tolerance: DEFAULT_DEGENERATE_TOLERANCE,
            imaginary_tolerance: DEFAULT_IMAGINARY_TOLERANCE,
            model: GbmParams::default(),
            functionals: vec![
                FunctionalConfig {
                    name: "Asian".to_string(),
                    kind: FunctionalKind::RunningAverage,
                    payoff: Payoff::Vanilla,
                    levels: vec![0.9, 0.95, 1.0, 1.05, 1.1],
                    truncation: Some(3),
                    alias_of: None,
                },
                FunctionalConfig {
                    name: "Lookback".to_string(),
                    kind: FunctionalKind::RunningMax,
                    payoff: Payoff::Vanilla,
                    levels: vec![1.0, 1.05, 1.1, 1.15, 1.2],
                    truncation: Some(10),
                    alias_of: None,
                },
                FunctionalConfig {
                    name: "UpAndOut".to_string(),
                    kind: FunctionalKind::RunningMax,
                    payoff: Payoff::DigitalBarrier,
                    levels: vec![1.1, 1.2, 1.3, 1.4],
                    truncation: None,
                    alias_of: Some("Lookback".to_string()),
                },
                FunctionalConfig {
                    name: "European".to_string(),
                    kind: FunctionalKind::Identity,
                    payoff: Payoff::Vanilla,
                    levels: vec![0.9, 0.95, 1.0, 1.05, 1.1],
                    truncation: Some(10),
                    alias_of: None,
                },
            ],
        }
    }
}

impl ExperimentConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> KlmcResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> KlmcResult<Self> {
        let cfg: ExperimentConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn benchmark_steps(&self) -> usize {
        self.online_steps * self.benchmark_multiplier
    }

    pub fn functional(&self, name: &str) -> Option<&FunctionalConfig> {
        self.functionals.iter().find(|f| f.name == name)
    }

    /// Validate the whole configuration before any simulation work
    pub fn validate(&self) -> KlmcResult<()> {
        validate_positive("horizon", self.horizon)?;
        validate_finite("horizon", self.horizon)?;
        validate_steps("offline_steps", self.offline_steps)?;
        validate_steps("online_steps", self.online_steps)?;
        if self.benchmark_multiplier == 0 {
            return Err(KlmcError::InvalidConfiguration {
                field: "benchmark_multiplier".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        validate_steps("benchmark steps", self.benchmark_steps())?;
        self.model.validate()?;
        validate_paths("offline_sims", self.offline_sims)?;
        validate_paths("benchmark_sims", self.benchmark_sims)?;
        if self.online_sims.is_empty() {
            return Err(KlmcError::InvalidConfiguration {
                field: "online_sims".to_string(),
                reason: "at least one simulation count is required".to_string(),
            });
        }
        for &j in &self.online_sims {
            validate_paths("online_sims", j)?;
        }
        if self.quantile_points < 2 {
            return Err(KlmcError::InvalidConfiguration {
                field: "quantile_points".to_string(),
                reason: "needs at least 2 partition points".to_string(),
            });
        }
        validate_non_negative("maturity_tolerance", self.maturity_tolerance)?;
        validate_non_negative("degenerate_tolerance", self.degenerate_tolerance)?;
        validate_non_negative("imaginary_tolerance", self.imaginary_tolerance)?;

        if self.maturities.is_empty() {
            return Err(KlmcError::InvalidConfiguration {
                field: "maturities".to_string(),
                reason: "at least one maturity is required".to_string(),
            });
        }
        for &m in &self.maturities {
            validate_positive("maturity", m)?;
            if m > self.horizon {
                return Err(KlmcError::MaturityOutOfRange {
                    maturity: m,
                    horizon: self.horizon,
                });
            }
        }

        self.validate_functionals()
    }

    fn validate_functionals(&self) -> KlmcResult<()> {
        if self.functionals.is_empty() {
            return Err(KlmcError::InvalidConfiguration {
                field: "functionals".to_string(),
                reason: "at least one functional is required".to_string(),
            });
        }
        let mut names = HashSet::new();
        for f in &self.functionals {
            if !names.insert(f.name.as_str()) {
                return Err(KlmcError::InvalidConfiguration {
                    field: "functionals".to_string(),
                    reason: format!("duplicate functional name '{}'", f.name),
                });
            }
            if f.levels.is_empty() {
                return Err(KlmcError::InvalidConfiguration {
                    field: format!("{}.levels", f.name),
                    reason: "at least one level is required".to_string(),
                });
            }
            for &level in &f.levels {
                validate_positive("level", level)?;
                validate_finite("level", level)?;
            }

            match (&f.truncation, &f.alias_of) {
                (Some(k), None) => {
                    let rank = self.offline_steps + 1;
                    if *k == 0 || *k > rank {
                        return Err(KlmcError::NumericalRank {
                            requested: *k,
                            available: rank,
                        });
                    }
                }
                (None, Some(target)) => {
                    let source = self.functional(target).ok_or_else(|| KlmcError::UnknownFunctional {
                        name: target.clone(),
                    })?;
                    if source.alias_of.is_some() {
                        return Err(KlmcError::InvalidConfiguration {
                            field: format!("{}.alias_of", f.name),
                            reason: format!("'{}' is itself an alias", target),
                        });
                    }
                    if source.kind != f.kind {
                        return Err(KlmcError::InvalidConfiguration {
                            field: format!("{}.kind", f.name),
                            reason: format!("alias kind {:?} differs from '{}' ({:?})", f.kind, target, source.kind),
                        });
                    }
                }
                _ => {
                    return Err(KlmcError::InvalidConfiguration {
                        field: f.name.clone(),
                        reason: "set exactly one of `truncation` or `alias_of`".to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Functional registry with sources registered before aliases
    pub fn registry(&self) -> KlmcResult<FunctionalRegistry> {
        let mut registry = FunctionalRegistry::new();
        for f in self.functionals.iter().filter(|f| f.alias_of.is_none()) {
            registry.register(&f.name, f.kind)?;
        }
        for f in &self.functionals {
            if let Some(target) = &f.alias_of {
                registry.register_alias(&f.name, target)?;
            }
        }
        Ok(registry)
    }

    /// Training settings per source functional
    pub fn training_settings(&self) -> BTreeMap<String, TrainingSettings> {
        self.functionals
            .iter()
            .filter_map(|f| {
                f.truncation.map(|k| {
                    (
                        f.name.clone(),
                        TrainingSettings {
                            truncation: k,
                            quantile_points: self.quantile_points,
                            degenerate_tolerance: self.degenerate_tolerance,
                            imaginary_tolerance: self.imaginary_tolerance,
                        },
                    )
                })
            })
            .collect()
    }
}
