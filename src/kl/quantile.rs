// src/kl/quantile.rs
//! Empirical quantile functions of KL coefficients
//!
//! The online phase samples each coefficient by inverse transform:
//! `ξ = Q(U)`, `U ~ Uniform(0, 1)`. `Q` is built non-parametrically:
//!
//! 1. take a partition `p_0 = 0 < p_1 < ... < p_{n-1} = 1` of `[0, 1]`,
//! 2. evaluate the empirical quantile of the sample at each `p_i`
//!    (linear interpolation between order statistics),
//! 3. interpolate linearly between the `(p_i, q_i)` nodes.
//!
//! Heavy or asymmetric tails of the coefficient distribution are kept.

use super::interp::LinearInterpolant;
use crate::error::{KlmcError, KlmcResult};
use crate::math_utils::linspace;
use ndarray::ArrayView1;

/// Default number of partition points on [0, 1]
pub const DEFAULT_QUANTILE_POINTS: usize = 10_000;

/// Default lower bound on the sample standard deviation
pub const DEFAULT_DEGENERATE_TOLERANCE: f64 = 1e-10;

/// Linear-interpolation empirical quantile of an ascending sample
pub fn empirical_quantile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Continuous map `[0, 1] → coefficient value`
#[derive(Debug, Clone, PartialEq)]
pub struct QuantileFunction {
    interpolant: LinearInterpolant,
}

impl QuantileFunction {
    /// Fit to a coefficient sample
    ///
    /// `index` only labels errors. Samples whose standard deviation is at
    /// most `degenerate_tolerance` are rejected.
    pub fn fit(
        sample: ArrayView1<f64>,
        points: usize,
        degenerate_tolerance: f64,
        index: usize,
    ) -> KlmcResult<Self> {
        if points < 2 {
            return Err(KlmcError::InvalidConfiguration {
                field: "quantile_points".to_string(),
                reason: "needs at least 2 partition points".to_string(),
            });
        }
        if sample.len() < 2 {
            return Err(KlmcError::DegenerateDistribution { index, std_dev: 0.0 });
        }
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(KlmcError::NumericalInstability {
                method: "quantile fit".to_string(),
                reason: format!("coefficient {} has non-finite values", index),
            });
        }

        let std_dev = sample.std(1.0);
        if !(std_dev > degenerate_tolerance) {
            return Err(KlmcError::DegenerateDistribution { index, std_dev });
        }

        let mut sorted = sample.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let probs = linspace(0.0, 1.0, points);
        let mut quantiles: Vec<f64> = probs.iter().map(|&p| empirical_quantile(&sorted, p)).collect();
        // Rounding can break monotonicity by an ulp
        for i in 1..quantiles.len() {
            if quantiles[i] < quantiles[i - 1] {
                quantiles[i] = quantiles[i - 1];
            }
        }

        Ok(Self {
            interpolant: LinearInterpolant::new(probs, quantiles)?,
        })
    }

    /// Coefficient value for a probability `u ∈ [0, 1]`
    pub fn value(&self, u: f64) -> f64 {
        self.interpolant.value(u)
    }

    pub fn min(&self) -> f64 {
        self.interpolant.y()[0]
    }

    pub fn max(&self) -> f64 {
        let ys = self.interpolant.y();
        ys[ys.len() - 1]
    }

    /// Closure view `u ↦ Q(u)`
    pub fn as_fn(&self) -> impl Fn(f64) -> f64 + '_ {
        move |u| self.value(u)
    }
}
