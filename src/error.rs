// src/error.rs
use thiserror::Error;

/// Error types for the klmc library
#[derive(Error, Debug)]
pub enum KlmcError {
    /// Invalid parameter values
    #[error("Invalid parameter '{parameter}' = {value}: {constraint}")]
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfiguration { field: String, reason: String },

    /// Truncation level exceeds the usable eigenbasis rank
    #[error("Truncation level K = {requested} exceeds the usable eigenbasis rank {available}")]
    NumericalRank { requested: usize, available: usize },

    /// A coefficient sample has (numerically) zero spread
    #[error("Coefficient {index} has a degenerate distribution (std dev {std_dev:e})")]
    DegenerateDistribution { index: usize, std_dev: f64 },

    /// A maturity does not sit on the simulation grid
    #[error("Maturity {maturity} is not on the time grid (nearest point {nearest}, tolerance {tolerance:e})")]
    MaturityLookup {
        maturity: f64,
        nearest: f64,
        tolerance: f64,
    },

    /// A maturity lies outside the trained horizon
    #[error("Maturity {maturity} lies outside the trained horizon [0, {horizon}]")]
    MaturityOutOfRange { maturity: f64, horizon: f64 },

    /// Arrays of incompatible dimensions
    #[error("Shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// The weighted Fredholm operator has eigenvalues with a non-negligible imaginary part
    #[error("Eigenvalue {index} has imaginary part {imaginary:e} (real part {real:e}) above tolerance {tolerance:e}")]
    ComplexSpectrum {
        index: usize,
        real: f64,
        imaginary: f64,
        tolerance: f64,
    },

    /// Numerical instability or convergence failure
    #[error("Numerical instability in {method}: {reason}")]
    NumericalInstability { method: String, reason: String },

    /// A functional name that is not registered
    #[error("Unknown functional '{name}'")]
    UnknownFunctional { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Config serialisation error: {0}")]
    ConfigSerialise(#[from] toml::ser::Error),
}

/// Result type alias for klmc operations
pub type KlmcResult<T> = Result<T, KlmcError>;

/// Validation utilities
pub mod validation {
    use super::{KlmcError, KlmcResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> KlmcResult<()> {
        if value.is_nan() || value <= 0.0 {
            Err(KlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is non-negative
    pub fn validate_non_negative(name: &str, value: f64) -> KlmcResult<()> {
        if value.is_nan() || value < 0.0 {
            Err(KlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be non-negative (≥ 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> KlmcResult<()> {
        if !value.is_finite() {
            Err(KlmcError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate paths (simulation) count
    pub fn validate_paths(field: &str, paths: usize) -> KlmcResult<()> {
        if paths < 2 {
            Err(KlmcError::InvalidConfiguration {
                field: field.to_string(),
                reason: "needs at least 2 simulations".to_string(),
            })
        } else if paths > 1_000_000_000 {
            Err(KlmcError::InvalidConfiguration {
                field: field.to_string(),
                reason: "exceeds maximum allowed (1 billion)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate steps count
    pub fn validate_steps(field: &str, steps: usize) -> KlmcResult<()> {
        if steps == 0 {
            Err(KlmcError::InvalidConfiguration {
                field: field.to_string(),
                reason: "must be greater than 0".to_string(),
            })
        } else if steps > 100_000 {
            Err(KlmcError::InvalidConfiguration {
                field: field.to_string(),
                reason: "exceeds maximum allowed (100,000)".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
