//! Time-step constraints `c(uo, un, z) = 0` linking the state before (`uo`) and after (`un`) one
//! step under control `z`.

use crate::error::KError;

/// Evaluation point of a dynamic constraint.
#[derive(Clone, Copy, Debug)]
pub struct Step<'a> {
    pub uo: &'a [f64],
    pub un: &'a [f64],
    pub z: &'a [f64],
}

/// A single-step constraint with its first and second derivatives.
///
/// The constraint value lives in the state space. `v` is the direction, the first argument the
/// output. Adjoint operations take a constraint-space multiplier `w`.
pub trait DynamicConstraint {
    fn state_dim(&self) -> usize;
    fn control_dim(&self) -> usize;

    fn value(&self, c: &mut [f64], at: &Step<'_>);

    fn apply_jacobian_uo(&self, jv: &mut [f64], v: &[f64], at: &Step<'_>);
    fn apply_jacobian_un(&self, jv: &mut [f64], v: &[f64], at: &Step<'_>);
    fn apply_jacobian_z(&self, jv: &mut [f64], v: &[f64], at: &Step<'_>);

    fn apply_adjoint_jacobian_uo(&self, ajw: &mut [f64], w: &[f64], at: &Step<'_>);
    fn apply_adjoint_jacobian_un(&self, ajw: &mut [f64], w: &[f64], at: &Step<'_>);
    fn apply_adjoint_jacobian_z(&self, ajw: &mut [f64], w: &[f64], at: &Step<'_>);

    /// `(∂c/∂un)⁻¹ v`; fails if the Jacobian is singular at `at`.
    fn apply_inverse_jacobian_un(&self, ijv: &mut [f64], v: &[f64], at: &Step<'_>) -> Result<(), KError>;
    fn apply_inverse_adjoint_jacobian_un(&self, iajw: &mut [f64], w: &[f64], at: &Step<'_>) -> Result<(), KError>;

    /// `(∂²⟨w, c⟩/∂uo²) v`.
    fn apply_adjoint_hessian_uo_uo(&self, ahwv: &mut [f64], w: &[f64], v: &[f64], at: &Step<'_>);
    /// `(∂²⟨w, c⟩/∂un²) v`.
    fn apply_adjoint_hessian_un_un(&self, ahwv: &mut [f64], w: &[f64], v: &[f64], at: &Step<'_>);
}
