// src/analytics/benchmark.rs
//! Accuracy of candidate price surfaces against a high-resolution reference

use crate::error::{KlmcError, KlmcResult};
use crate::mc::aggregator::PriceSurface;
use ndarray::Array2;
use serde::Serialize;
use std::fmt;

/// Elementwise error `candidate - reference` and its mean square
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceComparison {
    pub errors: Array2<f64>,
    pub mse: f64,
}

impl SurfaceComparison {
    pub fn max_abs_error(&self) -> f64 {
        self.errors.iter().fold(0.0f64, |m, e| m.max(e.abs()))
    }
}

/// Compare two surfaces defined on the same `(level, maturity)` grid
pub fn compare_surfaces(reference: &PriceSurface, candidate: &PriceSurface) -> KlmcResult<SurfaceComparison> {
    if reference.dim() != candidate.dim() {
        return Err(KlmcError::ShapeMismatch {
            context: "surface comparison".to_string(),
            expected: reference.dim(),
            actual: candidate.dim(),
        });
    }
    let same_axes = |a: &[f64], b: &[f64]| a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1e-12);
    if !same_axes(&reference.levels, &candidate.levels)
        || !same_axes(&reference.maturities, &candidate.maturities)
    {
        return Err(KlmcError::InvalidConfiguration {
            field: "surface comparison".to_string(),
            reason: "level or maturity axes differ".to_string(),
        });
    }

    let errors = &candidate.prices - &reference.prices;
    let mse = errors.mapv(|e| e * e).mean().unwrap_or(0.0);
    Ok(SurfaceComparison { errors, mse })
}

/// Pricing method of a report row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    #[serde(rename = "KLMC")]
    Klmc,
    #[serde(rename = "MC")]
    Mc,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Klmc => write!(f, "KLMC"),
            Method::Mc => write!(f, "MC"),
        }
    }
}

/// Configuration tag: truncation level for KLMC, step count for MC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigTag {
    Truncation(usize),
    Steps(usize),
}

impl fmt::Display for ConfigTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigTag::Truncation(k) => write!(f, "K={}", k),
            ConfigTag::Steps(n) => write!(f, "N={}", n),
        }
    }
}

/// One row of the error/runtime summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub functional: String,
    pub method: Method,
    pub sims: usize,
    pub tag: String,
    pub mse: f64,
    pub max_abs_error: f64,
    pub runtime_ms: f64,
}

impl ReportRow {
    pub fn new(
        functional: &str,
        method: Method,
        sims: usize,
        tag: ConfigTag,
        comparison: &SurfaceComparison,
        runtime_ms: f64,
    ) -> Self {
        Self {
            functional: functional.to_string(),
            method,
            sims,
            tag: tag.to_string(),
            mse: comparison.mse,
            max_abs_error: comparison.max_abs_error(),
            runtime_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn surface(prices: Array2<f64>) -> PriceSurface {
        let (l, m) = prices.dim();
        PriceSurface {
            levels: (0..l).map(|i| 1.0 + 0.1 * i as f64).collect(),
            maturities: (1..=m).map(|i| i as f64).collect(),
            std_errors: Array2::zeros((l, m)),
            prices,
        }
    }

    #[test]
    fn test_mse() {
        let reference = surface(array![[1.0, 2.0], [3.0, 4.0]]);
        let candidate = surface(array![[1.5, 2.0], [3.0, 3.0]]);
        let cmp = compare_surfaces(&reference, &candidate).unwrap();
        assert!((cmp.mse - (0.25 + 1.0) / 4.0).abs() < 1e-12);
        assert_eq!(cmp.errors[[1, 1]], -1.0);
        assert_eq!(cmp.max_abs_error(), 1.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let reference = surface(array![[1.0, 2.0]]);
        let candidate = surface(array![[1.0], [2.0]]);
        assert!(matches!(
            compare_surfaces(&reference, &candidate),
            Err(KlmcError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_tags() {
        assert_eq!(ConfigTag::Truncation(5).to_string(), "K=5");
        assert_eq!(ConfigTag::Steps(100).to_string(), "N=100");
        assert_eq!(Method::Klmc.to_string(), "KLMC");
    }
}
