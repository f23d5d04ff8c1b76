//! Relaxation used inside the multigrid cycles.
//!
//! Both smoothers are applied with a zero initial guess and are symmetric positive definite
//! operators, which keeps the symmetric V-cycle usable as a CG preconditioner.

use crate::config::ParameterList;
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::CsrMatrix;
use crate::preconditioner::chebyshev::{Chebyshev, POWER_ITERATIONS, estimate_lambda_max};
use crate::preconditioner::jacobi::inverse_diagonal;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmootherKind {
    Chebyshev,
    Jacobi,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SmootherParams {
    pub kind: SmootherKind,
    /// Jacobi sweeps; ignored by Chebyshev (use `degree`).
    pub sweeps: usize,
    pub degree: usize,
    pub ratio: f64,
    pub boost: f64,
    /// Jacobi damping. `None` picks `4 / (3 λmax)`.
    pub damping: Option<f64>,
}

impl Default for SmootherParams {
    fn default() -> Self {
        Self {
            kind: SmootherKind::Chebyshev,
            sweeps: 1,
            degree: 2,
            ratio: 20.0,
            boost: 1.1,
            damping: None,
        }
    }
}

impl SmootherParams {
    /// Reads the `smoother:`, `chebyshev:` and `relaxation:` keys, falling back to `defaults`.
    pub fn from_list(list: &ParameterList, defaults: &SmootherParams) -> Result<Self, KError> {
        let kind = match list.get_str(
            "smoother: type",
            match defaults.kind {
                SmootherKind::Chebyshev => "CHEBYSHEV",
                SmootherKind::Jacobi => "JACOBI",
            },
        )? {
            s if s.eq_ignore_ascii_case("CHEBYSHEV") => SmootherKind::Chebyshev,
            s if s.eq_ignore_ascii_case("JACOBI") || s.eq_ignore_ascii_case("RELAXATION") => SmootherKind::Jacobi,
            other => return Err(KError::invalid("smoother: type", format!("unknown smoother `{other}`"))),
        };
        let damping = match list.get("relaxation: damping factor") {
            None => defaults.damping,
            Some(_) => Some(list.get_f64("relaxation: damping factor", 1.0)?),
        };
        let sweeps = list.get_usize("smoother: sweeps", defaults.sweeps)?;
        // in the Chebyshev case "smoother: sweeps" is the polynomial degree unless given explicitly
        let degree_default = if list.contains("smoother: sweeps") && kind == SmootherKind::Chebyshev {
            sweeps
        } else {
            defaults.degree
        };
        Ok(Self {
            kind,
            sweeps,
            degree: list.get_usize("chebyshev: degree", degree_default)?,
            ratio: list.get_f64("chebyshev: ratio eigenvalue", defaults.ratio)?,
            boost: list.get_f64("chebyshev: boost factor", defaults.boost)?,
            damping,
        })
    }
}

pub struct JacobiSmoother {
    a: Arc<CsrMatrix>,
    inv_diag: Vec<f64>,
    omega: f64,
    sweeps: usize,
}

impl JacobiSmoother {
    pub fn new(a: Arc<CsrMatrix>, sweeps: usize, damping: Option<f64>) -> Result<Self, KError> {
        if sweeps == 0 {
            return Err(KError::invalid("smoother: sweeps", "must be at least 1"));
        }
        let inv_diag = inverse_diagonal(&a);
        let omega = match damping {
            Some(w) => w,
            None => {
                let l = estimate_lambda_max(&a, &inv_diag, POWER_ITERATIONS)? * 1.1;
                if l > 0.0 { 4.0 / (3.0 * l) } else { 1.0 }
            }
        };
        Ok(Self { a, inv_diag, omega, sweeps })
    }

    /// `sweeps` damped Jacobi steps from `z = 0`.
    pub fn smooth(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let n = self.inv_diag.len();
        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = self.omega * di * ri;
        }
        let mut az = vec![0.0; n];
        for _ in 1..self.sweeps {
            self.a.apply(z, &mut az)?;
            for i in 0..n {
                z[i] += self.omega * self.inv_diag[i] * (r[i] - az[i]);
            }
        }
        Ok(())
    }
}

pub enum Smoother {
    Chebyshev(Chebyshev),
    Jacobi(JacobiSmoother),
}

impl Smoother {
    pub fn new(a: Arc<CsrMatrix>, params: &SmootherParams) -> Result<Self, KError> {
        match params.kind {
            SmootherKind::Chebyshev => Ok(Smoother::Chebyshev(Chebyshev::new(
                a,
                params.degree,
                params.ratio,
                params.boost,
            )?)),
            SmootherKind::Jacobi => Ok(Smoother::Jacobi(JacobiSmoother::new(a, params.sweeps, params.damping)?)),
        }
    }

    pub fn smooth(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        match self {
            Smoother::Chebyshev(c) => c.smooth(r, z),
            Smoother::Jacobi(j) => j.smooth(r, z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::RowPartition;

    #[test]
    fn params_follow_list_then_defaults() {
        let mut list = ParameterList::new();
        list.set("smoother: type", "JACOBI").set("smoother: sweeps", 3usize);
        let p = SmootherParams::from_list(&list, &SmootherParams::default()).unwrap();
        assert_eq!(p.kind, SmootherKind::Jacobi);
        assert_eq!(p.sweeps, 3);
        assert_eq!(p.degree, 2);

        let mut cheb = ParameterList::new();
        cheb.set("smoother: sweeps", 3usize);
        assert_eq!(SmootherParams::from_list(&cheb, &SmootherParams::default()).unwrap().degree, 3);

        let mut bad = ParameterList::new();
        bad.set("smoother: type", "ILUT");
        assert!(SmootherParams::from_list(&bad, &SmootherParams::default()).is_err());
    }

    #[test]
    fn jacobi_smoother_reduces_residual() {
        let p = RowPartition::serial(5);
        let mut t = Vec::new();
        for i in 0..5 {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < 5 {
                t.push((i, i + 1, -1.0));
            }
        }
        let a = Arc::new(CsrMatrix::from_triplets(p.clone(), p, &t).unwrap());
        let s = JacobiSmoother::new(a.clone(), 4, None).unwrap();
        let r = vec![1.0; 5];
        let mut z = vec![0.0; 5];
        s.smooth(&r, &mut z).unwrap();
        let mut az = vec![0.0; 5];
        a.apply(&z, &mut az).unwrap();
        let res: f64 = r.iter().zip(&az).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt();
        assert!(res < 5f64.sqrt());
    }
}
