//! Preconditioner selection and construction.
//!
//! The `PC` enum names every supported preconditioner together with its parameters. It is read
//! from a [`ParameterList`] (`preconditioner: type` plus the type-specific keys) and turned into a
//! boxed [`Preconditioner`] by [`PC::build`].
//!
//! # Supported Preconditioners
//!
//! - None: identity.
//! - Jacobi: inverse diagonal, applied on the local rows.
//! - Chebyshev: polynomial in `D⁻¹A`, applied distributed.
//! - Amg: smoothed aggregation, replicated on every rank.
//! - RefMaxwell: auxiliary-space preconditioner for edge operators, replicated on every rank.
//!
//! # Example
//!
//! ```rust,ignore
//! use edgesolve::context::pc_context::PC;
//! let pc = PC::from_params(&params)?.build(&sm, Some(&aux))?;
//! ```

use crate::config::ParameterList;
use crate::error::KError;
use crate::matrix::{CsrMatrix, MultiVector};
use crate::preconditioner::{
    Amg, AmgParams, Chebyshev, IdentityPc, Jacobi, Preconditioner, RefMaxwell, RefMaxwellParams, Replicated,
    SmootherParams,
};
use log::info;
use std::sync::Arc;

/// Unified preconditioner enum for all supported types.
#[derive(Debug, Clone, PartialEq)]
pub enum PC {
    /// No preconditioning (`z = r`).
    None,
    /// Inverse-diagonal scaling.
    Jacobi,
    /// Chebyshev polynomial preconditioner.
    ///
    /// - `degree`: polynomial degree.
    /// - `ratio`: `λmax / λmin` of the targeted interval.
    /// - `boost`: safety factor applied to the estimated `λmax`.
    Chebyshev { degree: usize, ratio: f64, boost: f64 },
    /// Smoothed-aggregation algebraic multigrid.
    Amg(AmgParams),
    /// Auxiliary-space Maxwell preconditioner; needs [`AuxiliaryData`].
    RefMaxwell(RefMaxwellParams),
}

impl Default for PC {
    fn default() -> Self {
        PC::RefMaxwell(RefMaxwellParams::default())
    }
}

/// Discrete operators and geometry the auxiliary-space preconditioner needs besides `A`.
#[derive(Clone, Copy)]
pub struct AuxiliaryData<'a> {
    /// Edge-node incidence (gradient).
    pub d0: &'a CsrMatrix,
    /// Lumped inverse of the nodal mass matrix.
    pub m0inv: &'a CsrMatrix,
    /// Edge mass matrix.
    pub m1: &'a CsrMatrix,
    /// Node coordinates, one column per spatial dimension.
    pub coords: &'a MultiVector,
}

impl PC {
    /// Reads `preconditioner: type` (default `refmaxwell`) and the keys of the chosen type.
    pub fn from_params(list: &ParameterList) -> Result<Self, KError> {
        let kind = list.get_str("preconditioner: type", "refmaxwell")?.to_ascii_lowercase();
        match kind.as_str() {
            "none" | "identity" => Ok(PC::None),
            "jacobi" => Ok(PC::Jacobi),
            "chebyshev" => {
                let p = SmootherParams::from_list(list, &SmootherParams::default())?;
                Ok(PC::Chebyshev { degree: p.degree, ratio: p.ratio, boost: p.boost })
            }
            "amg" => Ok(PC::Amg(AmgParams::from_list(list, &AmgParams::default())?)),
            "refmaxwell" => Ok(PC::RefMaxwell(RefMaxwellParams::from_list(list)?)),
            other => Err(KError::invalid("preconditioner: type", format!("unknown preconditioner `{other}`"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PC::None => "none",
            PC::Jacobi => "jacobi",
            PC::Chebyshev { .. } => "chebyshev",
            PC::Amg(_) => "amg",
            PC::RefMaxwell(_) => "refmaxwell",
        }
    }

    /// Builds the preconditioner for `a`. Collective.
    ///
    /// The result acts on vectors distributed like `a`'s rows.
    pub fn build(&self, a: &CsrMatrix, aux: Option<&AuxiliaryData<'_>>) -> Result<Box<dyn Preconditioner>, KError> {
        info!("building {} preconditioner for {} rows", self.name(), a.global_nrows());
        let map = a.row_partition().clone();
        match self {
            PC::None => Ok(Box::new(IdentityPc)),
            PC::Jacobi => Ok(Box::new(Jacobi::from_matrix(a))),
            PC::Chebyshev { degree, ratio, boost } => {
                Ok(Box::new(Chebyshev::new(Arc::new(a.clone()), *degree, *ratio, *boost)?))
            }
            PC::Amg(params) => {
                let amg = Amg::new(&a.replicate(), params)?;
                Ok(Box::new(Replicated::new(map, amg)))
            }
            PC::RefMaxwell(params) => {
                let aux = aux.ok_or(KError::invalid(
                    "preconditioner: type",
                    "refmaxwell needs D0, M0inv, M1 and coordinates",
                ))?;
                let coords = aux.coords.gather_columns();
                let rm = RefMaxwell::new(a, aux.d0, aux.m0inv, aux.m1, &coords, params)?;
                Ok(Box::new(Replicated::new(map, rm)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::RowPartition;

    #[test]
    fn default_type_is_refmaxwell() {
        let pc = PC::from_params(&ParameterList::new()).unwrap();
        assert_eq!(pc, PC::default());
        assert_eq!(pc.name(), "refmaxwell");
    }

    #[test]
    fn chebyshev_keys_are_read() {
        let mut list = ParameterList::new();
        list.set("preconditioner: type", "Chebyshev").set("chebyshev: degree", 4usize);
        assert_eq!(
            PC::from_params(&list).unwrap(),
            PC::Chebyshev { degree: 4, ratio: 20.0, boost: 1.1 }
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut list = ParameterList::new();
        list.set("preconditioner: type", "ilut");
        assert!(matches!(PC::from_params(&list), Err(KError::InvalidParameter { .. })));
    }

    #[test]
    fn refmaxwell_without_aux_data_fails() {
        let p = RowPartition::serial(2);
        let a = CsrMatrix::identity(p);
        assert!(PC::default().build(&a, None).is_err());
    }

    #[test]
    fn jacobi_builds_and_applies() {
        let p = RowPartition::serial(3);
        let a = CsrMatrix::from_diagonal(p, vec![2.0, 4.0, 8.0]).unwrap();
        let pc = PC::Jacobi.build(&a, None).unwrap();
        let mut z = vec![0.0; 3];
        pc.apply(&[2.0, 2.0, 2.0], &mut z).unwrap();
        assert_eq!(z, vec![1.0, 0.5, 0.25]);
    }
}
