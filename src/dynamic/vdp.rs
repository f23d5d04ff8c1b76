//! Van der Pol oscillator `u1' = u2, u2' = z (1 − u1²) u2 − u1`, discretised with the
//! trapezoidal rule:
//!
//! `c(uo, un, z) = un − uo − dt/2 · (f(uo, z) + f(un, z))`.

use crate::dynamic::constraint::{DynamicConstraint, Step};
use crate::error::KError;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VanDerPol {
    pub dt: f64,
}

impl Default for VanDerPol {
    fn default() -> Self {
        Self { dt: 0.1 }
    }
}

/// Right-hand side `f(u, z)`.
fn rhs(u: &[f64], z: f64) -> [f64; 2] {
    [u[1], z * (1.0 - u[0] * u[0]) * u[1] - u[0]]
}

/// `∂f/∂u` as a row-major 2×2 matrix.
fn rhs_jacobian(u: &[f64], z: f64) -> [[f64; 2]; 2] {
    [[0.0, 1.0], [-2.0 * z * u[0] * u[1] - 1.0, z * (1.0 - u[0] * u[0])]]
}

/// `∂f/∂z`; only the second component depends on the control.
fn rhs_control(u: &[f64]) -> f64 {
    (1.0 - u[0] * u[0]) * u[1]
}

/// `(w₂ ∂²f₂/∂u²) v`; `f₁` is linear.
fn rhs_hessian_action(u: &[f64], z: f64, w: &[f64], v: &[f64]) -> [f64; 2] {
    let (h11, h12) = (-2.0 * z * u[1], -2.0 * z * u[0]);
    [w[1] * (h11 * v[0] + h12 * v[1]), w[1] * h12 * v[0]]
}

impl VanDerPol {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    /// `∂c/∂uo = −I − dt/2 ∂f/∂u(uo)` (`sign = -1`) or `∂c/∂un = I − dt/2 ∂f/∂u(un)` (`sign = 1`).
    fn step_jacobian(&self, u: &[f64], z: f64, sign: f64) -> [[f64; 2]; 2] {
        let jf = rhs_jacobian(u, z);
        let h = 0.5 * self.dt;
        [
            [sign - h * jf[0][0], -h * jf[0][1]],
            [-h * jf[1][0], sign - h * jf[1][1]],
        ]
    }
}

fn matvec(m: &[[f64; 2]; 2], v: &[f64], out: &mut [f64]) {
    out[0] = m[0][0] * v[0] + m[0][1] * v[1];
    out[1] = m[1][0] * v[0] + m[1][1] * v[1];
}

fn transpose(m: &[[f64; 2]; 2]) -> [[f64; 2]; 2] {
    [[m[0][0], m[1][0]], [m[0][1], m[1][1]]]
}

fn solve(m: &[[f64; 2]; 2], v: &[f64], out: &mut [f64]) -> Result<(), KError> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det == 0.0 || !det.is_finite() {
        return Err(KError::FactorError(format!("singular 2x2 Jacobian (det = {det})")));
    }
    out[0] = (m[1][1] * v[0] - m[0][1] * v[1]) / det;
    out[1] = (m[0][0] * v[1] - m[1][0] * v[0]) / det;
    Ok(())
}

impl DynamicConstraint for VanDerPol {
    fn state_dim(&self) -> usize {
        2
    }

    fn control_dim(&self) -> usize {
        1
    }

    fn value(&self, c: &mut [f64], at: &Step<'_>) {
        let z = at.z[0];
        let (fo, fn_) = (rhs(at.uo, z), rhs(at.un, z));
        for i in 0..2 {
            c[i] = at.un[i] - at.uo[i] - 0.5 * self.dt * (fo[i] + fn_[i]);
        }
    }

    fn apply_jacobian_uo(&self, jv: &mut [f64], v: &[f64], at: &Step<'_>) {
        matvec(&self.step_jacobian(at.uo, at.z[0], -1.0), v, jv);
    }

    fn apply_jacobian_un(&self, jv: &mut [f64], v: &[f64], at: &Step<'_>) {
        matvec(&self.step_jacobian(at.un, at.z[0], 1.0), v, jv);
    }

    fn apply_jacobian_z(&self, jv: &mut [f64], v: &[f64], at: &Step<'_>) {
        jv[0] = 0.0;
        jv[1] = -0.5 * self.dt * (rhs_control(at.uo) + rhs_control(at.un)) * v[0];
    }

    fn apply_adjoint_jacobian_uo(&self, ajw: &mut [f64], w: &[f64], at: &Step<'_>) {
        matvec(&transpose(&self.step_jacobian(at.uo, at.z[0], -1.0)), w, ajw);
    }

    fn apply_adjoint_jacobian_un(&self, ajw: &mut [f64], w: &[f64], at: &Step<'_>) {
        matvec(&transpose(&self.step_jacobian(at.un, at.z[0], 1.0)), w, ajw);
    }

    fn apply_adjoint_jacobian_z(&self, ajw: &mut [f64], w: &[f64], at: &Step<'_>) {
        ajw[0] = -0.5 * self.dt * (rhs_control(at.uo) + rhs_control(at.un)) * w[1];
    }

    fn apply_inverse_jacobian_un(&self, ijv: &mut [f64], v: &[f64], at: &Step<'_>) -> Result<(), KError> {
        solve(&self.step_jacobian(at.un, at.z[0], 1.0), v, ijv)
    }

    fn apply_inverse_adjoint_jacobian_un(&self, iajw: &mut [f64], w: &[f64], at: &Step<'_>) -> Result<(), KError> {
        solve(&transpose(&self.step_jacobian(at.un, at.z[0], 1.0)), w, iajw)
    }

    fn apply_adjoint_hessian_uo_uo(&self, ahwv: &mut [f64], w: &[f64], v: &[f64], at: &Step<'_>) {
        let hv = rhs_hessian_action(at.uo, at.z[0], w, v);
        ahwv[0] = -0.5 * self.dt * hv[0];
        ahwv[1] = -0.5 * self.dt * hv[1];
    }

    fn apply_adjoint_hessian_un_un(&self, ahwv: &mut [f64], w: &[f64], v: &[f64], at: &Step<'_>) {
        let hv = rhs_hessian_action(at.un, at.z[0], w, v);
        ahwv[0] = -0.5 * self.dt * hv[0];
        ahwv[1] = -0.5 * self.dt * hv[1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn residual_vanishes_for_trapezoidal_step_of_linear_oscillator() {
        // z = 0 leaves u'' = -u; one trapezoidal step is the Cayley transform of the rotation
        let dt = 0.2;
        let vdp = VanDerPol::new(dt);
        let uo = [1.0, 0.0];
        let a = dt / 2.0;
        let un = [(1.0 - a * a) / (1.0 + a * a), -2.0 * a / (1.0 + a * a)];
        let mut c = [0.0; 2];
        vdp.value(&mut c, &Step { uo: &uo, un: &un, z: &[0.0] });
        assert_relative_eq!(c[0], 0.0, epsilon = 1e-14);
        assert_relative_eq!(c[1], 0.0, epsilon = 1e-14);
    }

    #[test]
    fn inverse_jacobian_undoes_jacobian() {
        let vdp = VanDerPol::default();
        let at = Step { uo: &[0.3, -0.2], un: &[0.5, 0.7], z: &[1.5] };
        let v = [0.4, -1.1];
        let (mut jv, mut back) = ([0.0; 2], [0.0; 2]);
        vdp.apply_jacobian_un(&mut jv, &v, &at);
        vdp.apply_inverse_jacobian_un(&mut back, &jv, &at).unwrap();
        assert_relative_eq!(back[0], v[0], epsilon = 1e-13);
        assert_relative_eq!(back[1], v[1], epsilon = 1e-13);
    }
}
