//! Preconditioners for the CG solver.
//!
//! This module defines the Preconditioner trait and its implementations: Jacobi, Chebyshev,
//! smoothed-aggregation AMG and the auxiliary-space Maxwell preconditioner.

use crate::error::KError;
use crate::matrix::CsrMatrix;

/// A preconditioner M ≈ A⁻¹.
///
/// `apply` is collective for distributed preconditioners and must be linear and deterministic: the
/// same `r` always yields the same `z` on every rank.
pub trait Preconditioner {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError>;
    /// Optionally: setup from A
    fn setup(&mut self, _a: &CsrMatrix) -> Result<(), KError> {
        Ok(())
    }
}

impl<P: Preconditioner + ?Sized> Preconditioner for Box<P> {
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        (**self).apply(r, z)
    }
    fn setup(&mut self, a: &CsrMatrix) -> Result<(), KError> {
        (**self).setup(a)
    }
}

/// `z = r`.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPc;

impl Preconditioner for IdentityPc {
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        if r.len() != z.len() {
            return Err(KError::DimensionMismatch(format!("identity: {} vs {}", r.len(), z.len())));
        }
        z.copy_from_slice(r);
        Ok(())
    }
}

pub mod amg;
pub mod chebyshev;
pub mod jacobi;
pub mod refmaxwell;
pub mod replicated;
pub mod smoother;

pub use amg::{Amg, AmgParams};
pub use chebyshev::Chebyshev;
pub use jacobi::Jacobi;
pub use refmaxwell::{RefMaxwell, RefMaxwellMode, RefMaxwellParams};
pub use replicated::Replicated;
pub use smoother::{Smoother, SmootherKind, SmootherParams};

/// Unified preconditioner enum for all supported types.
pub use crate::context::pc_context::{AuxiliaryData, PC};
