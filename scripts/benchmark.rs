// scripts/benchmark.rs
use clap::{Parser, ValueEnum};
use klmc::config::ExperimentConfig;
use klmc::runner::{run_experiment, ExperimentReport, Methods};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// KLMC versus standard Monte Carlo pricing experiment
#[derive(Parser, Debug)]
#[command(name = "klmc-bench")]
#[command(version, about, long_about = None)]
struct Args {
    /// Experiment configuration (TOML); built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for surfaces and tables; a timestamped run directory is created inside
    #[arg(short, long, value_name = "DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Pricing methods to run against the benchmark
    #[arg(short, long, value_enum, value_delimiter = ',', default_values_t = vec![MethodArg::Klmc, MethodArg::Mc])]
    methods: Vec<MethodArg>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Klmc,
    Mc,
}

fn selected_methods(args: &[MethodArg]) -> Methods {
    args.iter().fold(Methods::empty(), |acc, m| match m {
        MethodArg::Klmc => acc | Methods::KLMC,
        MethodArg::Mc => acc | Methods::MC,
    })
}

#[derive(Debug)]
struct SystemInfo {
    os: String,
    cpu_model: String,
    cpu_cores: usize,
    rayon_threads: usize,
}

impl SystemInfo {
    fn gather() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            cpu_model: Self::get_cpu_model(),
            cpu_cores: num_cpus::get(),
            rayon_threads: rayon::current_num_threads(),
        }
    }

    fn get_cpu_model() -> String {
        #[cfg(target_os = "linux")]
        {
            std::fs::read_to_string("/proc/cpuinfo")
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|line| line.starts_with("model name"))
                        .and_then(|line| line.split(':').nth(1))
                        .map(|s| s.trim().to_string())
                })
                .unwrap_or_else(|| "Unknown CPU".to_string())
        }

        #[cfg(target_os = "macos")]
        {
            std::process::Command::new("sysctl")
                .args(["-n", "machdep.cpu.brand_string"])
                .output()
                .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
                .unwrap_or_else(|_| "Unknown CPU".to_string())
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            "Unknown CPU".to_string()
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_summary(report: &ExperimentReport) {
    println!("\n{:=<88}", "");
    println!("PRICING ERRORS VS BENCHMARK");
    println!("{:=<88}", "");
    println!(
        "{:<12} {:>6} {:>9} {:>8} {:>14} {:>14} {:>14}",
        "Functional", "Method", "J", "Config", "MSE", "Max |err|", "Time (ms)"
    );
    println!("{:-<88}", "");
    for row in &report.rows {
        println!(
            "{:<12} {:>6} {:>9} {:>8} {:>14.4e} {:>14.4e} {:>14.2}",
            row.functional,
            row.method.to_string(),
            row.sims,
            row.tag,
            row.mse,
            row.max_abs_error,
            row.runtime_ms
        );
    }
    println!("{:=<88}", "");
    println!("Offline training: {:.2} ms", report.offline_ms);
    println!("Benchmark MC:     {:.2} ms", report.benchmark_ms);

    for (name, model) in &report.models {
        println!(
            "  {:<12} K={:<3} captured variance {:.4}",
            name,
            model.truncation(),
            model.captured_variance
        );
    }
    for (name, reason) in &report.failures {
        println!("  FAILED {}: {}", name, reason);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    let methods = selected_methods(&args.methods);

    let system_info = SystemInfo::gather();
    tracing::info!(
        os = %system_info.os,
        cpu = %system_info.cpu_model,
        cores = system_info.cpu_cores,
        rayon_threads = system_info.rayon_threads,
        "system"
    );

    let report = run_experiment(&config, methods)?;
    print_summary(&report);

    let run_dir = args
        .output_dir
        .join(report.started.format("run_%Y%m%d_%H%M%S").to_string());
    report.write_to(&run_dir)?;
    println!("\nResults saved to: {}", run_dir.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "experiment failed");
            ExitCode::FAILURE
        }
    }
}
