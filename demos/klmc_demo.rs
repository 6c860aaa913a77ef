// demos/klmc_demo.rs
use klmc::functionals::FunctionalKind;
use klmc::grid::{QuadratureWeights, TimeGrid};
use klmc::kl::{KlmcSampler, TrainedModel, TrainingSettings};
use klmc::math_utils::Timer;
use klmc::mc::aggregator::{PriceAggregator, PriceSurface};
use klmc::mc::mc_engine::{mc_price_surface, McConfig};
use klmc::mc::payoffs::Payoff;
use klmc::models::gbm::{GbmParams, PathSimulator};
use klmc::rng::RngFactory;
use klmc::KlmcResult;
use tracing::info;

const OFFLINE_STEPS: usize = 50;
const OFFLINE_SIMS: usize = 10_000;
const TRUNCATION: usize = 5;
const ONLINE_SIMS: usize = 20_000;

fn main() -> KlmcResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let params = GbmParams::default();
    let levels = [1.0, 1.05, 1.1, 1.2];
    let maturities = [0.25, 0.5, 0.75, 1.0];

    // offline: fit the running maximum once
    let timer = Timer::new();
    let grid = TimeGrid::new(1.0, OFFLINE_STEPS)?;
    let weights = QuadratureWeights::trapezoidal(&grid);
    let prices = PathSimulator::new(params)?.simulate(&grid, OFFLINE_SIMS, &RngFactory::new(42))?;
    let functional = FunctionalKind::RunningMax.apply(prices.view())?;
    let model = TrainedModel::train(
        FunctionalKind::RunningMax,
        functional.view(),
        &grid,
        &weights,
        &TrainingSettings::new(TRUNCATION),
    )?;
    info!(
        captured_variance = model.captured_variance,
        elapsed_ms = timer.elapsed_ms(),
        "trained lookback model with K = {}",
        model.truncation()
    );

    // online: only the requested maturities are evaluated
    let timer = Timer::new();
    let values = KlmcSampler::new(&model).sample(&maturities, ONLINE_SIMS, &RngFactory::new(7))?;
    let klmc = PriceAggregator::new(Payoff::Vanilla, params.r, params.x0)?
        .price_surface(values.view(), &maturities, &levels)?;
    let klmc_ms = timer.elapsed_ms();

    let timer = Timer::new();
    let mc_cfg = McConfig {
        params,
        horizon: 1.0,
        steps: OFFLINE_STEPS,
        sims: ONLINE_SIMS,
        seed: 7,
        ..Default::default()
    };
    let mc = mc_price_surface(&mc_cfg, FunctionalKind::RunningMax, Payoff::Vanilla, &levels, &maturities)?;
    let mc_ms = timer.elapsed_ms();

    print_surface(&format!("KLMC lookback call ({:.1} ms)", klmc_ms), &klmc);
    print_surface(&format!("MC lookback call ({:.1} ms)", mc_ms), &mc);
    Ok(())
}

fn print_surface(title: &str, surface: &PriceSurface) {
    println!("\n{}", title);
    print!("{:>8}", "level");
    for tau in &surface.maturities {
        print!("{:>18}", format!("τ = {}", tau));
    }
    println!();
    for (l, level) in surface.levels.iter().enumerate() {
        print!("{:>8.2}", level);
        for m in 0..surface.maturities.len() {
            print!(
                "{:>18}",
                format!("{:.4} ± {:.4}", surface.price(l, m), surface.std_errors[[l, m]])
            );
        }
        println!();
    }
}
