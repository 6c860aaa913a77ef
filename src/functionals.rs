// src/functionals.rs
//! Running path functionals
//!
//! A functional maps an ensemble of price paths to a derived ensemble of the
//! same shape (time × simulations):
//!
//! - **Identity**: the underlying itself (European-style payoffs).
//! - **Running average**: `A_0 = S_0`,
//!   `A_i = (1/i) Σ_{l=1}^{i} (S_{l-1} + S_l) / 2` (Asian).
//! - **Running maximum**: `M_i = max_{l ≤ i} S_l` (lookback / barrier).
//!
//! Named functionals live in a [`FunctionalRegistry`]. An entry may alias
//! another entry's source, in which case both share the same computed
//! ensemble and trained model.

use crate::error::{KlmcError, KlmcResult};
use ndarray::parallel::prelude::*;
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalKind {
    Identity,
    RunningAverage,
    RunningMax,
}

impl FunctionalKind {
    /// Apply the functional to a `(time, sims)` ensemble
    pub fn apply(&self, paths: ArrayView2<f64>) -> KlmcResult<Array2<f64>> {
        if paths.nrows() == 0 || paths.ncols() == 0 {
            return Err(KlmcError::ShapeMismatch {
                context: format!("{:?} functional", self),
                expected: (1, 1),
                actual: paths.dim(),
            });
        }
        let mut out = paths.to_owned();
        match self {
            FunctionalKind::Identity => {}
            FunctionalKind::RunningAverage => {
                out.axis_iter_mut(Axis(1))
                    .into_par_iter()
                    .zip(paths.axis_iter(Axis(1)))
                    .for_each(|(mut dst, src)| {
                        let mut area = 0.0;
                        for i in 1..src.len() {
                            area += 0.5 * (src[i - 1] + src[i]);
                            dst[i] = area / i as f64;
                        }
                    });
            }
            FunctionalKind::RunningMax => {
                out.axis_iter_mut(Axis(1)).into_par_iter().for_each(|mut col| {
                    let mut running = col[0];
                    for v in col.iter_mut().skip(1) {
                        running = running.max(*v);
                        *v = running;
                    }
                });
            }
        }
        Ok(out)
    }
}

/// One named functional, either computed from its kind or aliasing another name
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionalEntry {
    pub name: String,
    pub kind: FunctionalKind,
    pub alias_of: Option<String>,
}

/// Name → functional lookup with alias resolution
#[derive(Debug, Clone, Default)]
pub struct FunctionalRegistry {
    entries: Vec<FunctionalEntry>,
}

impl FunctionalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, kind: FunctionalKind) -> KlmcResult<()> {
        self.insert(FunctionalEntry {
            name: name.to_string(),
            kind,
            alias_of: None,
        })
    }

    /// Register `name` as sharing the output of `target`
    pub fn register_alias(&mut self, name: &str, target: &str) -> KlmcResult<()> {
        let source = self.resolve(target)?.to_string();
        let kind = self
            .get(&source)
            .map(|e| e.kind)
            .ok_or_else(|| KlmcError::UnknownFunctional {
                name: target.to_string(),
            })?;
        self.insert(FunctionalEntry {
            name: name.to_string(),
            kind,
            alias_of: Some(source),
        })
    }

    fn insert(&mut self, entry: FunctionalEntry) -> KlmcResult<()> {
        if self.get(&entry.name).is_some() {
            return Err(KlmcError::InvalidConfiguration {
                field: "functionals".to_string(),
                reason: format!("duplicate functional name '{}'", entry.name),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionalEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Name of the entry whose output `name` uses (itself unless aliased)
    pub fn resolve<'a>(&'a self, name: &str) -> KlmcResult<&'a str> {
        let entry = self.get(name).ok_or_else(|| KlmcError::UnknownFunctional {
            name: name.to_string(),
        })?;
        Ok(entry.alias_of.as_deref().unwrap_or(&entry.name))
    }

    /// Entries that own a computation, in registration order
    pub fn sources(&self) -> impl Iterator<Item = &FunctionalEntry> {
        self.entries.iter().filter(|e| e.alias_of.is_none())
    }

    pub fn entries(&self) -> &[FunctionalEntry] {
        &self.entries
    }
}
