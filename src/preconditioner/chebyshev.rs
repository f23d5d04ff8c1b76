//! Chebyshev polynomial preconditioner / smoother.
//!
//! Applies `z = p(D⁻¹A) D⁻¹ r`, where `p` is the Chebyshev polynomial of the requested degree
//! that damps the interval `[λmax / ratio, λmax]` of `D⁻¹A`. `λmax` comes from a short power
//! iteration and is boosted to stay above the true value. The result is a fixed symmetric positive
//! definite operator, so it can precondition CG directly or serve as a multigrid smoother.

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::CsrMatrix;
use crate::preconditioner::Preconditioner;
use crate::preconditioner::jacobi::inverse_diagonal;
use log::debug;
use std::sync::Arc;

/// Power-iteration steps used to estimate `λmax(D⁻¹A)`.
pub const POWER_ITERATIONS: usize = 10;

pub struct Chebyshev {
    a: Arc<CsrMatrix>,
    inv_diag: Vec<f64>,
    pub degree: usize,
    pub lambda_min: f64,
    pub lambda_max: f64,
}

impl Chebyshev {
    /// Estimates `λmax(D⁻¹A)`, multiplies it by `boost` and targets `[λmax / ratio, λmax]`.
    pub fn new(a: Arc<CsrMatrix>, degree: usize, ratio: f64, boost: f64) -> Result<Self, KError> {
        if ratio <= 1.0 {
            return Err(KError::invalid("chebyshev: ratio eigenvalue", format!("must exceed 1, got {ratio}")));
        }
        let inv_diag = inverse_diagonal(&a);
        let mut lambda_max = estimate_lambda_max(&a, &inv_diag, POWER_ITERATIONS)? * boost;
        if !(lambda_max > 0.0) {
            lambda_max = 1.0;
        }
        let lambda_min = lambda_max / ratio;
        debug!(
            "chebyshev: n={} degree={} lambda in [{lambda_min:.4e}, {lambda_max:.4e}]",
            a.global_nrows(),
            degree
        );
        Self::build(a, inv_diag, degree, lambda_min, lambda_max)
    }

    /// Uses the given spectral interval of `D⁻¹A` instead of estimating it.
    pub fn with_bounds(a: Arc<CsrMatrix>, degree: usize, lambda_min: f64, lambda_max: f64) -> Result<Self, KError> {
        if !(0.0 < lambda_min && lambda_min < lambda_max) {
            return Err(KError::invalid(
                "chebyshev",
                format!("need 0 < lambda_min < lambda_max, got [{lambda_min}, {lambda_max}]"),
            ));
        }
        let inv_diag = inverse_diagonal(&a);
        Self::build(a, inv_diag, degree, lambda_min, lambda_max)
    }

    fn build(a: Arc<CsrMatrix>, inv_diag: Vec<f64>, degree: usize, lambda_min: f64, lambda_max: f64) -> Result<Self, KError> {
        if degree == 0 {
            return Err(KError::invalid("chebyshev: degree", "must be at least 1"));
        }
        Ok(Self { a, inv_diag, degree, lambda_min, lambda_max })
    }

    pub fn matrix(&self) -> &Arc<CsrMatrix> {
        &self.a
    }

    /// `z = p(D⁻¹A) D⁻¹ r` (zero initial guess).
    pub fn smooth(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let n = self.inv_diag.len();
        if r.len() != n || z.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "chebyshev: set up for {n} rows, got r={} z={}",
                r.len(),
                z.len()
            )));
        }
        let theta = 0.5 * (self.lambda_max + self.lambda_min);
        let delta = 0.5 * (self.lambda_max - self.lambda_min);
        let sigma = theta / delta;
        let mut rho = 1.0 / sigma;

        let mut d: Vec<f64> = r.iter().zip(&self.inv_diag).map(|(&ri, &di)| di * ri / theta).collect();
        z.copy_from_slice(&d);
        let mut az = vec![0.0; n];
        for _ in 1..self.degree {
            let rho_new = 1.0 / (2.0 * sigma - rho);
            self.a.apply(z, &mut az)?;
            let c1 = rho_new * rho;
            let c2 = 2.0 * rho_new / delta;
            for i in 0..n {
                d[i] = c1 * d[i] + c2 * self.inv_diag[i] * (r[i] - az[i]);
                z[i] += d[i];
            }
            rho = rho_new;
        }
        Ok(())
    }
}

impl Preconditioner for Chebyshev {
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        self.smooth(r, z)
    }
}

/// Power-iteration estimate of the largest eigenvalue of `D⁻¹A`. Collective.
///
/// Starts from a fixed non-constant vector (a function of the global row index), so every rank
/// and every run gets the same estimate.
pub fn estimate_lambda_max(a: &CsrMatrix, inv_diag: &[f64], iters: usize) -> Result<f64, KError> {
    let comm = a.row_partition().comm();
    let first = a.row_partition().local_range().start;
    let n = a.local_nrows();
    let mut x: Vec<f64> = (0..n)
        .map(|i| 0.5 + ((first + i) as f64 * 0.618_033_988_749_895).fract())
        .collect();
    let mut y = vec![0.0; n];
    let mut lambda = 0.0;
    let norm = comm.dot(&x, &x).sqrt();
    if norm == 0.0 {
        return Ok(0.0);
    }
    x.iter_mut().for_each(|v| *v /= norm);
    for _ in 0..iters {
        a.apply(&x, &mut y)?;
        y.iter_mut().zip(inv_diag).for_each(|(v, &d)| *v *= d);
        lambda = comm.dot(&x, &y);
        let ny = comm.dot(&y, &y).sqrt();
        if ny == 0.0 {
            return Ok(0.0);
        }
        for (xi, &yi) in x.iter_mut().zip(&y) {
            *xi = yi / ny;
        }
    }
    Ok(lambda)
}
