// tests/kl_properties_test.rs
use approx::assert_abs_diff_eq;
use klmc::functionals::FunctionalKind;
use klmc::grid::{QuadratureWeights, TimeGrid};
use klmc::kl::quantile::{QuantileFunction, DEFAULT_DEGENERATE_TOLERANCE, DEFAULT_QUANTILE_POINTS};
use klmc::kl::solver::gram_matrix;
use klmc::kl::KarhunenLoeveSolver;
use klmc::models::gbm::{GbmParams, PathSimulator};
use klmc::rng::RngFactory;
use ndarray::Array2;

fn functional_paths(kind: FunctionalKind, steps: usize, sims: usize, seed: u64) -> (TimeGrid, Array2<f64>) {
    let grid = TimeGrid::new(1.0, steps).unwrap();
    let prices = PathSimulator::new(GbmParams::default())
        .unwrap()
        .simulate(&grid, sims, &RngFactory::new(seed))
        .unwrap();
    let functional = kind.apply(prices.view()).unwrap();
    (grid, functional)
}

#[test]
fn test_eigenbasis_is_orthonormal() {
    for kind in [
        FunctionalKind::Identity,
        FunctionalKind::RunningAverage,
        FunctionalKind::RunningMax,
    ] {
        let (grid, paths) = functional_paths(kind, 50, 4_000, 11);
        let weights = QuadratureWeights::trapezoidal(&grid);
        let kl = KarhunenLoeveSolver::new(10).fit(paths.view(), &weights).unwrap();

        let gram = gram_matrix(&kl.basis, &weights).unwrap();
        for i in 0..10 {
            for j in 0..10 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(gram[[i, j]], expected, epsilon = 1e-6);
            }
        }
        let eig = kl.eigenvalues.to_vec();
        assert!(eig.windows(2).all(|w| w[0] >= w[1]), "{:?}: eigenvalues not sorted", kind);
    }
}

#[test]
fn test_full_rank_reconstruction_is_exact() {
    let (grid, paths) = functional_paths(FunctionalKind::RunningAverage, 12, 300, 5);
    let weights = QuadratureWeights::trapezoidal(&grid);
    let kl = KarhunenLoeveSolver::new(grid.len()).fit(paths.view(), &weights).unwrap();
    let rebuilt = kl.reconstruct();

    assert_eq!(rebuilt.dim(), paths.dim());
    for (a, b) in rebuilt.iter().zip(paths.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-8 * b.abs().max(1.0));
    }
}

#[test]
fn test_coefficient_quantile_round_trip() {
    let (grid, paths) = functional_paths(FunctionalKind::RunningMax, 20, 2_000, 9);
    let weights = QuadratureWeights::trapezoidal(&grid);
    let kl = KarhunenLoeveSolver::new(3).fit(paths.view(), &weights).unwrap();

    for k in 0..3 {
        let sample = kl.coefficients.row(k);
        let q = QuantileFunction::fit(sample, DEFAULT_QUANTILE_POINTS, DEFAULT_DEGENERATE_TOLERANCE, k).unwrap();

        let mut sorted = sample.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        for i in (0..n).step_by(97) {
            // empirical CDF of the i-th order statistic
            let u = i as f64 / (n - 1) as f64;
            let value = q.value(u);
            let lo = sorted[i.saturating_sub(1)];
            let hi = sorted[(i + 1).min(n - 1)];
            assert!(
                value >= lo - 1e-12 && value <= hi + 1e-12,
                "k = {}, i = {}: {} outside [{}, {}]",
                k,
                i,
                value,
                lo,
                hi
            );
        }
        assert_abs_diff_eq!(q.min(), sorted[0], epsilon = 1e-12);
        assert_abs_diff_eq!(q.max(), sorted[n - 1], epsilon = 1e-12);
    }
}

#[test]
fn test_leading_eigenvalues_capture_most_variance() {
    let (grid, paths) = functional_paths(FunctionalKind::RunningAverage, 40, 4_000, 2);
    let weights = QuadratureWeights::trapezoidal(&grid);
    let k1 = KarhunenLoeveSolver::new(1).fit(paths.view(), &weights).unwrap();
    let k5 = KarhunenLoeveSolver::new(5).fit(paths.view(), &weights).unwrap();

    // the running average is smoother than Brownian motion
    assert!(k1.captured_variance() > 0.85, "{}", k1.captured_variance());
    assert!(k5.captured_variance() > k1.captured_variance());
    assert!(k5.captured_variance() <= 1.0 + 1e-12);
}
