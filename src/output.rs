// src/output.rs
//! CSV persistence of price surfaces and summary tables
//!
//! Surfaces are written one file per `(method, functional, sims, tag)` with
//! levels as rows and maturities as columns.

use crate::analytics::benchmark::{Method, ReportRow};
use crate::config::ExperimentConfig;
use crate::error::KlmcResult;
use crate::mc::aggregator::PriceSurface;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Wall-clock time of one pricing run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeRow {
    pub functional: String,
    pub method: Method,
    pub sims: usize,
    pub runtime_ms: f64,
}

/// File name of a surface, e.g. `KLMC_Asian_J10000_K=3.csv`
pub fn surface_file_name(method: Method, functional: &str, sims: usize, tag: &str) -> String {
    format!("{}_{}_J{}_{}.csv", method, functional, sims, tag)
}

pub fn write_price_surface(path: &Path, surface: &PriceSurface) -> KlmcResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["level".to_string()];
    header.extend(surface.maturities.iter().map(|m| m.to_string()));
    writer.write_record(&header)?;

    for (l, level) in surface.levels.iter().enumerate() {
        let mut record = vec![level.to_string()];
        record.extend(surface.prices.row(l).iter().map(|p| p.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> KlmcResult<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_runtime_table(path: &Path, rows: &[RuntimeRow]) -> KlmcResult<()> {
    write_rows(path, rows)
}

pub fn write_report(path: &Path, rows: &[ReportRow]) -> KlmcResult<()> {
    write_rows(path, rows)
}

/// Record the run timestamp and the effective configuration
pub fn write_run_metadata(dir: &Path, config: &ExperimentConfig, started: DateTime<Utc>) -> KlmcResult<PathBuf> {
    let path = dir.join("run.toml");
    let body = toml::to_string(config)?;
    fs::write(&path, format!("# started {}\n{}", started.to_rfc3339(), body))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KlmcError;
    use ndarray::array;

    #[test]
    fn test_surface_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let surface = PriceSurface {
            levels: vec![1.0, 1.1],
            maturities: vec![0.5, 1.0],
            prices: array![[5.0, 8.0], [1.0, 3.5]],
            std_errors: array![[0.1, 0.1], [0.1, 0.1]],
        };
        let path = dir.path().join(surface_file_name(Method::Mc, "Asian", 1000, "N=100"));
        write_price_surface(&path, &surface).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "level,0.5,1");
        assert_eq!(lines[1], "1,5,8");
        assert_eq!(lines[2], "1.1,1,3.5");
        assert!(path.ends_with("MC_Asian_J1000_N=100.csv"));
    }

    #[test]
    fn test_runtime_table_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.csv");
        let rows = vec![RuntimeRow {
            functional: "Lookback".to_string(),
            method: Method::Klmc,
            sims: 100,
            runtime_ms: 1.5,
        }];
        write_runtime_table(&path, &rows).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("functional,method,sims,runtime_ms"));
        assert!(content.contains("Lookback,KLMC,100,1.5"));
    }

    #[test]
    fn test_metadata_contains_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let started = Utc::now();
        let path = write_run_metadata(dir.path(), &ExperimentConfig::default(), started).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("# started"));
        assert!(content.contains("offline_steps = 100"));
    }

    #[test]
    fn test_metadata_parses_back_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::default();
        let path = write_run_metadata(dir.path(), &config, Utc::now()).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert_eq!(ExperimentConfig::from_toml_str(&content).unwrap(), config);
    }

    #[test]
    fn test_serialisation_error_is_propagated() {
        // a bare float cannot be a TOML document
        let error: KlmcError = toml::to_string(&1.5f64).unwrap_err().into();
        assert!(matches!(error, KlmcError::ConfigSerialise(_)), "{:?}", error);
        assert!(error.to_string().starts_with("Config serialisation error"));
    }
}
