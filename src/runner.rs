// src/runner.rs
//! Full pricing experiment
//!
//! 1. Benchmark: standard MC on `online_steps * benchmark_multiplier` steps.
//! 2. KLMC: offline training on `offline_steps`, then online sampling at
//!    every configured `J`.
//! 3. MC: standard MC on `online_steps` at every configured `J`.
//!
//! Every candidate surface is compared with the benchmark of its functional.
//! Functionals are processed independently: a failure is logged, recorded
//! in [`ExperimentReport::failures`] and the remaining functionals go on.

use crate::analytics::benchmark::{compare_surfaces, ConfigTag, Method, ReportRow};
use crate::analytics::bs_analytic::bs_call_surface;
use crate::config::{ExperimentConfig, FunctionalConfig};
use crate::error::{KlmcError, KlmcResult};
use crate::functionals::{FunctionalKind, FunctionalRegistry};
use crate::grid::TimeGrid;
use crate::kl::{train_all, KlmcSampler, TrainedModel};
use crate::math_utils::Timer;
use crate::mc::aggregator::{PriceAggregator, PriceSurface};
use crate::mc::mc_engine::{maturity_indices, mc_functional_values, DEFAULT_BATCH_SIZE};
use crate::mc::payoffs::Payoff;
use crate::models::gbm::PathSimulator;
use crate::output::{self, RuntimeRow};
use crate::rng::RngFactory;
use bitflags::bitflags;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

bitflags! {
    /// Pricing methods to run against the benchmark
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Methods: u32 {
        const KLMC = 1 << 0;
        const MC   = 1 << 1;
    }
}

// RNG streams derived from the configured seed
const OFFLINE_STREAM: u64 = 0;
const BENCHMARK_STREAM: u64 = 1;
const KLMC_STREAM_BASE: u64 = 1_000;
const MC_STREAM_BASE: u64 = 2_000;

/// One priced surface with the key it is persisted under
#[derive(Debug, Clone)]
pub struct SurfaceRecord {
    pub method: Method,
    pub functional: String,
    pub sims: usize,
    pub tag: ConfigTag,
    pub surface: PriceSurface,
}

impl SurfaceRecord {
    pub fn file_name(&self) -> String {
        output::surface_file_name(self.method, &self.functional, self.sims, &self.tag.to_string())
    }
}

/// Everything produced by [`run_experiment`]
#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub started: DateTime<Utc>,
    pub config: ExperimentConfig,
    pub methods: Methods,
    /// Benchmark surface per functional name
    pub benchmark: BTreeMap<String, PriceSurface>,
    pub surfaces: Vec<SurfaceRecord>,
    pub runtimes: Vec<RuntimeRow>,
    pub rows: Vec<ReportRow>,
    /// Trained model per functional name; aliases share their source's handle
    pub models: BTreeMap<String, Arc<TrainedModel>>,
    /// First failure per functional name
    pub failures: BTreeMap<String, String>,
    pub offline_ms: f64,
    pub benchmark_ms: f64,
}

impl ExperimentReport {
    fn new(config: &ExperimentConfig, methods: Methods) -> Self {
        Self {
            started: Utc::now(),
            config: config.clone(),
            methods,
            benchmark: BTreeMap::new(),
            surfaces: Vec::new(),
            runtimes: Vec::new(),
            rows: Vec::new(),
            models: BTreeMap::new(),
            failures: BTreeMap::new(),
            offline_ms: 0.0,
            benchmark_ms: 0.0,
        }
    }

    fn record_failure(&mut self, functional: &str, stage: &str, err: &KlmcError) {
        error!(functional, stage, error = %err, "functional skipped");
        self.failures
            .entry(functional.to_string())
            .or_insert_with(|| format!("{}: {}", stage, err));
    }

    /// Store a candidate surface, its runtime and its benchmark comparison
    fn record_surface(&mut self, record: SurfaceRecord, runtime_ms: f64) {
        self.runtimes.push(RuntimeRow {
            functional: record.functional.clone(),
            method: record.method,
            sims: record.sims,
            runtime_ms,
        });

        if let Some(reference) = self.benchmark.get(&record.functional) {
            match compare_surfaces(reference, &record.surface) {
                Ok(cmp) => {
                    info!(
                        functional = %record.functional,
                        method = %record.method,
                        sims = record.sims,
                        tag = %record.tag,
                        mse = cmp.mse,
                        runtime_ms,
                        "surface compared"
                    );
                    self.rows.push(ReportRow::new(
                        &record.functional,
                        record.method,
                        record.sims,
                        record.tag,
                        &cmp,
                        runtime_ms,
                    ));
                }
                Err(e) => {
                    let functional = record.functional.clone();
                    self.record_failure(&functional, "comparison", &e);
                }
            }
        }
        self.surfaces.push(record);
    }

    /// Rows for one method, in insertion order
    pub fn rows_for(&self, method: Method) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(move |r| r.method == method)
    }

    /// Write surfaces, runtime table, error summary and run metadata to `dir`
    pub fn write_to(&self, dir: &Path) -> KlmcResult<()> {
        fs::create_dir_all(dir)?;
        let benchmark_tag = ConfigTag::Steps(self.config.benchmark_steps()).to_string();
        for (name, surface) in &self.benchmark {
            let file = output::surface_file_name(Method::Mc, name, self.config.benchmark_sims, &benchmark_tag);
            output::write_price_surface(&dir.join(format!("benchmark_{}", file)), surface)?;
        }
        for record in &self.surfaces {
            output::write_price_surface(&dir.join(record.file_name()), &record.surface)?;
        }
        output::write_runtime_table(&dir.join("runtime.csv"), &self.runtimes)?;
        output::write_report(&dir.join("errors.csv"), &self.rows)?;
        output::write_run_metadata(dir, &self.config, self.started)?;
        info!(dir = %dir.display(), surfaces = self.surfaces.len(), "results written");
        Ok(())
    }
}

/// Values of every source functional at the maturity rows of `grid`
fn source_values(
    simulator: &PathSimulator,
    grid: &TimeGrid,
    registry: &FunctionalRegistry,
    sims: usize,
    indices: &[usize],
    rng: &RngFactory,
) -> KlmcResult<BTreeMap<String, Array2<f64>>> {
    let (names, kinds): (Vec<String>, Vec<_>) = registry.sources().map(|e| (e.name.clone(), e.kind)).unzip();
    let values = mc_functional_values(simulator, grid, &kinds, sims, indices, rng, DEFAULT_BATCH_SIZE)?;
    Ok(names.into_iter().zip(values).collect())
}

fn aggregator(config: &ExperimentConfig, functional: &FunctionalConfig) -> KlmcResult<PriceAggregator> {
    PriceAggregator::new(functional.payoff, config.model.r, config.model.x0)
}

fn run_benchmark(
    config: &ExperimentConfig,
    registry: &FunctionalRegistry,
    simulator: &PathSimulator,
    rng: &RngFactory,
    report: &mut ExperimentReport,
) -> KlmcResult<()> {
    let grid = TimeGrid::new(config.horizon, config.benchmark_steps())?;
    let indices = maturity_indices(&grid, &config.maturities, config.maturity_tolerance)?;
    info!(steps = grid.steps(), sims = config.benchmark_sims, "benchmark simulation");

    let timer = Timer::new();
    let values = source_values(
        simulator,
        &grid,
        registry,
        config.benchmark_sims,
        &indices,
        &rng.stream(BENCHMARK_STREAM),
    )?;

    for f in &config.functionals {
        let surface = registry
            .resolve(&f.name)
            .and_then(|source| {
                values.get(source).ok_or_else(|| KlmcError::UnknownFunctional {
                    name: source.to_string(),
                })
            })
            .and_then(|v| aggregator(config, f)?.price_surface(v.view(), &config.maturities, &f.levels));
        match surface {
            Ok(surface) => {
                if f.kind == FunctionalKind::Identity && f.payoff == Payoff::Vanilla {
                    let analytic = bs_call_surface(&config.model, &f.levels, &config.maturities);
                    if let Ok(cmp) = compare_surfaces(&analytic, &surface) {
                        info!(
                            functional = %f.name,
                            max_abs_error = cmp.max_abs_error(),
                            "benchmark vs Black-Scholes"
                        );
                    }
                }
                report.benchmark.insert(f.name.clone(), surface);
            }
            Err(e) => report.record_failure(&f.name, "benchmark", &e),
        }
    }
    report.benchmark_ms = timer.elapsed_ms();
    info!(runtime_ms = report.benchmark_ms, "benchmark priced");
    Ok(())
}

fn run_klmc(
    config: &ExperimentConfig,
    registry: &FunctionalRegistry,
    simulator: &PathSimulator,
    rng: &RngFactory,
    report: &mut ExperimentReport,
) -> KlmcResult<()> {
    let grid = TimeGrid::new(config.horizon, config.offline_steps)?;
    info!(steps = grid.steps(), sims = config.offline_sims, "offline phase");

    let timer = Timer::new();
    let price_paths = simulator.simulate(&grid, config.offline_sims, &rng.stream(OFFLINE_STREAM))?;
    let outcome = train_all(registry, price_paths.view(), &grid, &config.training_settings());
    drop(price_paths);
    report.offline_ms = timer.elapsed_ms();
    info!(runtime_ms = report.offline_ms, "offline phase done");

    for (name, model) in outcome {
        match model {
            Ok(model) => {
                debug!(
                    functional = %name,
                    eigenvalues = ?model.eigenvalues,
                    captured_variance = model.captured_variance,
                    "retained spectrum"
                );
                report.models.insert(name, model);
            }
            Err(e) => report.record_failure(&name, "offline", &e),
        }
    }

    for (i, &sims) in config.online_sims.iter().enumerate() {
        let stream = rng.stream(KLMC_STREAM_BASE + i as u64);
        for f in &config.functionals {
            let model = match report.models.get(&f.name) {
                Some(model) => Arc::clone(model),
                None => continue,
            };
            let timer = Timer::new();
            let surface = KlmcSampler::new(&model)
                .sample(&config.maturities, sims, &stream)
                .and_then(|v| aggregator(config, f)?.price_surface(v.view(), &config.maturities, &f.levels));
            let runtime_ms = timer.elapsed_ms();
            match surface {
                Ok(surface) => report.record_surface(
                    SurfaceRecord {
                        method: Method::Klmc,
                        functional: f.name.clone(),
                        sims,
                        tag: ConfigTag::Truncation(model.truncation()),
                        surface,
                    },
                    runtime_ms,
                ),
                Err(e) => report.record_failure(&f.name, "klmc online", &e),
            }
        }
    }
    Ok(())
}

fn run_mc(
    config: &ExperimentConfig,
    registry: &FunctionalRegistry,
    simulator: &PathSimulator,
    rng: &RngFactory,
    report: &mut ExperimentReport,
) -> KlmcResult<()> {
    let grid = TimeGrid::new(config.horizon, config.online_steps)?;
    let indices = maturity_indices(&grid, &config.maturities, config.maturity_tolerance)?;

    for (i, &sims) in config.online_sims.iter().enumerate() {
        let stream = rng.stream(MC_STREAM_BASE + i as u64);

        // simulate each source once; aliases price the same values
        let mut values: BTreeMap<&str, (Array2<f64>, f64)> = BTreeMap::new();
        for entry in registry.sources() {
            let timer = Timer::new();
            match mc_functional_values(simulator, &grid, &[entry.kind], sims, &indices, &stream, DEFAULT_BATCH_SIZE) {
                Ok(mut v) => {
                    values.insert(entry.name.as_str(), (v.remove(0), timer.elapsed_ms()));
                }
                Err(e) => report.record_failure(&entry.name, "mc simulation", &e),
            }
        }

        for f in &config.functionals {
            let (v, simulation_ms) = match registry.resolve(&f.name).ok().and_then(|s| values.get(s)) {
                Some(entry) => entry,
                None => continue,
            };
            let timer = Timer::new();
            let surface = aggregator(config, f).and_then(|a| a.price_surface(v.view(), &config.maturities, &f.levels));
            let runtime_ms = simulation_ms + timer.elapsed_ms();
            match surface {
                Ok(surface) => report.record_surface(
                    SurfaceRecord {
                        method: Method::Mc,
                        functional: f.name.clone(),
                        sims,
                        tag: ConfigTag::Steps(config.online_steps),
                        surface,
                    },
                    runtime_ms,
                ),
                Err(e) => report.record_failure(&f.name, "mc pricing", &e),
            }
        }
    }
    Ok(())
}

/// Run the configured experiment for the selected methods
///
/// Configuration and maturity placement are checked up front; afterwards
/// only per-functional errors occur and they are collected, not returned.
pub fn run_experiment(config: &ExperimentConfig, methods: Methods) -> KlmcResult<ExperimentReport> {
    config.validate()?;
    let registry = config.registry()?;
    let simulator = PathSimulator::new(config.model)?;
    let rng = RngFactory::new(config.seed);

    // MC and benchmark read raw grid rows
    let online_grid = TimeGrid::new(config.horizon, config.online_steps)?;
    maturity_indices(&online_grid, &config.maturities, config.maturity_tolerance)?;
    let benchmark_grid = TimeGrid::new(config.horizon, config.benchmark_steps())?;
    maturity_indices(&benchmark_grid, &config.maturities, config.maturity_tolerance)?;

    info!(
        functionals = config.functionals.len(),
        ?methods,
        seed = config.seed,
        "experiment started"
    );
    let mut report = ExperimentReport::new(config, methods);

    run_benchmark(config, &registry, &simulator, &rng, &mut report)?;
    if methods.contains(Methods::KLMC) {
        run_klmc(config, &registry, &simulator, &rng, &mut report)?;
    }
    if methods.contains(Methods::MC) {
        run_mc(config, &registry, &simulator, &rng, &mut report)?;
    }

    info!(
        surfaces = report.surfaces.len(),
        failures = report.failures.len(),
        "experiment finished"
    );
    Ok(report)
}
