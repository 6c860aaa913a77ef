// src/kl/solver.rs
//! Discrete Karhunen-Loève decomposition
//!
//! # Mathematical Framework
//!
//! For functional paths `Y` sampled on a uniform grid, the KL eigenpairs
//! solve the discretised Fredholm equation
//! ```text
//! Σ_j C(t_i, t_j) w_j dt φ(t_j) = λ φ(t_i)
//! ```
//! where `C` is the empirical covariance and `w` the trapezoidal weights.
//! The operator `A = C W dt` is not symmetric, but it is similar to
//! ```text
//! S = W^{1/2} C W^{1/2} dt,   φ = W^{-1/2} v / √dt
//! ```
//! so its spectrum is real in exact arithmetic. The solver checks that the
//! spectrum of `A` (from a real Schur decomposition) has imaginary parts at
//! noise level, then takes the eigenvectors from `S`.
//!
//! Eigenfunctions are normalised to unit quadrature norm and sorted by
//! descending eigenvalue. Coefficients are the quadrature projections
//! ```text
//! ξ_k = <Y - μ, φ_k> = dt Σ_i w_i (Y_i - μ_i) φ_k(t_i)
//! ```

use crate::error::{validation::*, KlmcError, KlmcResult};
use crate::grid::QuadratureWeights;
use nalgebra::{DMatrix, Schur, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::{debug, warn};

/// Default relative tolerance on imaginary eigenvalue parts
pub const DEFAULT_IMAGINARY_TOLERANCE: f64 = 1e-8;

const MAX_ITER_PER_DIM: usize = 1_000;

/// Result of a KL fit
#[derive(Debug, Clone)]
pub struct KlDecomposition {
    /// Empirical mean function, one value per grid point
    pub mean: Array1<f64>,
    /// All eigenvalues, sorted descending rather than in the eigensolver's
    /// order; `basis` holds the eigenfunctions of the first K
    pub eigenvalues: Array1<f64>,
    /// Retained eigenfunctions as columns, shape `(grid points, K)`
    pub basis: Array2<f64>,
    /// Projection coefficients, shape `(K, sims)`
    pub coefficients: Array2<f64>,
}

impl KlDecomposition {
    pub fn truncation(&self) -> usize {
        self.basis.ncols()
    }

    /// Fraction of total variance carried by the retained eigenvalues
    pub fn captured_variance(&self) -> f64 {
        let total: f64 = self.eigenvalues.iter().map(|l| l.max(0.0)).sum();
        if total <= 0.0 {
            return 1.0;
        }
        let kept: f64 = self
            .eigenvalues
            .iter()
            .take(self.truncation())
            .map(|l| l.max(0.0))
            .sum();
        kept / total
    }

    /// `μ + Σ_k φ_k ξ_k` on the training grid, using the fitted coefficients
    pub fn reconstruct(&self) -> Array2<f64> {
        let mut paths = self.basis.dot(&self.coefficients);
        paths += &self.mean.view().insert_axis(Axis(1));
        paths
    }
}

/// KL solver with a fixed truncation level
#[derive(Debug, Clone, Copy)]
pub struct KarhunenLoeveSolver {
    pub truncation: usize,
    pub imaginary_tolerance: f64,
}

impl KarhunenLoeveSolver {
    pub fn new(truncation: usize) -> Self {
        Self {
            truncation,
            imaginary_tolerance: DEFAULT_IMAGINARY_TOLERANCE,
        }
    }

    pub fn with_imaginary_tolerance(mut self, tolerance: f64) -> Self {
        self.imaginary_tolerance = tolerance;
        self
    }

    /// Fit mean, eigenbasis and coefficients to functional paths `(time, sims)`
    pub fn fit(&self, paths: ArrayView2<f64>, weights: &QuadratureWeights) -> KlmcResult<KlDecomposition> {
        let (n, sims) = paths.dim();
        if n != weights.len() {
            return Err(KlmcError::ShapeMismatch {
                context: "KL fit: functional paths vs quadrature weights".to_string(),
                expected: (weights.len(), sims),
                actual: (n, sims),
            });
        }
        validate_paths("sims", sims)?;
        validate_non_negative("imaginary_tolerance", self.imaginary_tolerance)?;
        if self.truncation == 0 || self.truncation > n {
            return Err(KlmcError::NumericalRank {
                requested: self.truncation,
                available: n,
            });
        }

        let mean = paths
            .mean_axis(Axis(1))
            .ok_or_else(|| KlmcError::NumericalInstability {
                method: "KL fit".to_string(),
                reason: "empty simulation axis".to_string(),
            })?;
        let centered = &paths - &mean.view().insert_axis(Axis(1));
        let covariance = centered.dot(&centered.t()) / (sims as f64 - 1.0);

        let dt = weights.dt();
        let w = weights.weights();
        let operator = DMatrix::from_fn(n, n, |i, j| covariance[[i, j]] * w[j] * dt);
        check_real_spectrum(&operator, self.imaginary_tolerance)?;

        let sqrt_w: Vec<f64> = w.iter().map(|x| x.sqrt()).collect();
        let symmetric =
            DMatrix::from_fn(n, n, |i, j| sqrt_w[i] * covariance[[i, j]] * sqrt_w[j] * dt);
        let eigen = SymmetricEigen::try_new(symmetric, f64::EPSILON, MAX_ITER_PER_DIM * n)
            .ok_or_else(|| KlmcError::NumericalInstability {
                method: "symmetric eigendecomposition".to_string(),
                reason: format!("no convergence for {}x{} covariance operator", n, n),
            })?;

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
        let eigenvalues = Array1::from_iter(order.iter().map(|&k| eigen.eigenvalues[k]));

        let k_max = self.truncation;
        let mut basis = Array2::<f64>::zeros((n, k_max));
        for (col, &k) in order.iter().take(k_max).enumerate() {
            let mut phi =
                Array1::from_iter((0..n).map(|i| eigen.eigenvectors[(i, k)] / (sqrt_w[i] * dt.sqrt())));
            let norm = weights.norm(phi.view())?;
            if !(norm.is_finite() && norm > 0.0) {
                return Err(KlmcError::NumericalInstability {
                    method: "KL fit".to_string(),
                    reason: format!("eigenfunction {} has quadrature norm {}", col, norm),
                });
            }
            phi /= norm;
            // Fix the sign so that ∫ φ ≥ 0
            if (&phi * w).sum() < 0.0 {
                phi.mapv_inplace(|x| -x);
            }
            basis.column_mut(col).assign(&phi);
        }

        let scale = eigenvalues.iter().fold(0.0f64, |m, l| m.max(l.abs()));
        for (k, &lambda) in eigenvalues.iter().take(k_max).enumerate() {
            if lambda <= scale * 1e-12 {
                warn!(index = k, eigenvalue = lambda, "retained eigenvalue is numerically zero");
            }
        }

        let weighted_basis = &basis * &(w * dt).insert_axis(Axis(1));
        let coefficients = weighted_basis.t().dot(&centered);

        let decomposition = KlDecomposition {
            mean,
            eigenvalues,
            basis,
            coefficients,
        };
        debug!(
            truncation = k_max,
            grid_points = n,
            sims,
            captured_variance = decomposition.captured_variance(),
            "KL decomposition fitted"
        );
        Ok(decomposition)
    }
}

/// Eigenvalues of a (possibly non-symmetric) real operator, asserting that
/// every imaginary part is within `tolerance` relative to the spectral scale
pub fn check_real_spectrum(operator: &DMatrix<f64>, tolerance: f64) -> KlmcResult<Vec<f64>> {
    let n = operator.nrows();
    let schur = Schur::try_new(operator.clone(), f64::EPSILON, MAX_ITER_PER_DIM * n.max(1))
        .ok_or_else(|| KlmcError::NumericalInstability {
            method: "Schur decomposition".to_string(),
            reason: format!("no convergence for {}x{} operator", n, n),
        })?;
    let spectrum = schur.complex_eigenvalues();

    let scale = spectrum
        .iter()
        .fold(f64::MIN_POSITIVE, |m, z| m.max(z.re.hypot(z.im)));
    for (index, z) in spectrum.iter().enumerate() {
        if z.im.abs() > tolerance * scale {
            return Err(KlmcError::ComplexSpectrum {
                index,
                real: z.re,
                imaginary: z.im,
                tolerance: tolerance * scale,
            });
        }
    }
    Ok(spectrum.iter().map(|z| z.re).collect())
}

/// Quadrature Gram matrix `G_kl = <φ_k, φ_l>` of the columns of `basis`
pub fn gram_matrix(basis: &Array2<f64>, weights: &QuadratureWeights) -> KlmcResult<Array2<f64>> {
    let k = basis.ncols();
    let mut gram = Array2::<f64>::zeros((k, k));
    for a in 0..k {
        for b in 0..k {
            gram[[a, b]] = weights.inner(basis.column(a), basis.column(b))?;
        }
    }
    Ok(gram)
}
