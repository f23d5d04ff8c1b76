//! Finite-difference and consistency checks for [`DynamicConstraint`] implementations.

use crate::dynamic::constraint::{DynamicConstraint, Step};
use crate::error::KError;
use log::info;
use rand::Rng;
use std::fmt::Write as _;

/// Every check [`check_dynamic_constraint`] knows.
pub const ALL_CHECKS: [&str; 10] = [
    "applyJacobian_uo",
    "applyJacobian_un",
    "applyJacobian_z",
    "applyAdjointJacobian_uo",
    "applyAdjointJacobian_un",
    "applyAdjointJacobian_z",
    "applyInverseJacobian_un",
    "applyInverseAdjointJacobian_un",
    "applyAdjointHessian_uo_uo",
    "applyAdjointHessian_un_un",
];

/// Finite-difference table settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValidateFunction {
    /// Finite-difference order, 1 to 4.
    pub order: usize,
    /// Steps `10^0, 10^-1, …, 10^-(num_steps-1)`.
    pub num_steps: usize,
    /// Column width of the printed table.
    pub width: usize,
    /// Digits printed per number.
    pub precision: usize,
    /// Largest accepted error, relative to `max(1, ‖exact‖)`.
    pub tolerance: f64,
}

impl Default for ValidateFunction {
    fn default() -> Self {
        Self {
            order: 1,
            num_steps: 13,
            width: 20,
            precision: 11,
            tolerance: 1e-6,
        }
    }
}

/// Result of one named check.
#[derive(Clone, Debug)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    /// Smallest relative error seen (over all steps for difference checks).
    pub error: f64,
    /// Human-readable table.
    pub report: String,
}

impl ValidateFunction {
    pub fn new(order: usize, num_steps: usize, width: usize, precision: usize) -> Result<Self, KError> {
        if !(1..=4).contains(&order) {
            return Err(KError::invalid("order", format!("finite differences of order {order} are not available")));
        }
        if num_steps == 0 {
            return Err(KError::invalid("num_steps", "need at least one step"));
        }
        Ok(Self {
            order,
            num_steps,
            width,
            precision,
            ..Self::default()
        })
    }

    pub fn steps(&self) -> Vec<f64> {
        (0..self.num_steps).map(|i| 10f64.powi(-(i as i32))).collect()
    }

    /// One-sided and central stencils as `(shift, weight)`; the result is divided by `t`.
    fn stencil(&self) -> &'static [(f64, f64)] {
        match self.order {
            1 => &[(0.0, -1.0), (1.0, 1.0)],
            2 => &[(0.0, -1.5), (1.0, 2.0), (2.0, -0.5)],
            3 => &[(-1.0, -1.0 / 3.0), (0.0, -0.5), (1.0, 1.0), (2.0, -1.0 / 6.0)],
            _ => &[(-2.0, 1.0 / 12.0), (-1.0, -2.0 / 3.0), (1.0, 2.0 / 3.0), (2.0, -1.0 / 12.0)],
        }
    }

    /// Compares `exact` with finite differences of `f` at `x` along `v`.
    pub fn derivative_table<F>(&self, name: &str, f: F, x: &[f64], v: &[f64], exact: &[f64]) -> CheckOutcome
    where
        F: Fn(&[f64], &mut [f64]),
    {
        let scale = norm(exact).max(1.0);
        let mut report = String::new();
        let (w, p) = (self.width, self.precision);
        let _ = writeln!(report, "{name}");
        let _ = writeln!(report, "{:>w$}{:>w$}{:>w$}{:>w$}", "Step size", "norm(exact)", "norm(fd)", "norm(error)");
        let mut best = f64::INFINITY;
        let mut xt = vec![0.0; x.len()];
        let mut ft = vec![0.0; exact.len()];
        for t in self.steps() {
            let mut fd = vec![0.0; exact.len()];
            for &(shift, weight) in self.stencil() {
                for ((xi, &x0), &vi) in xt.iter_mut().zip(x).zip(v) {
                    *xi = x0 + shift * t * vi;
                }
                f(&xt, &mut ft);
                fd.iter_mut().zip(&ft).for_each(|(d, &fi)| *d += weight * fi / t);
            }
            let err = norm(&fd.iter().zip(exact).map(|(a, b)| a - b).collect::<Vec<_>>());
            best = best.min(err / scale);
            let _ = writeln!(
                report,
                "{t:>w$.p$e}{:>w$.p$e}{:>w$.p$e}{err:>w$.p$e}",
                norm(exact),
                norm(&fd)
            );
        }
        CheckOutcome {
            name: name.to_string(),
            passed: best <= self.tolerance,
            error: best,
            report,
        }
    }

    /// Compares two numbers that must agree up to rounding (adjoint and inverse checks).
    pub fn consistency(&self, name: &str, lhs: f64, rhs: f64, what: &str) -> CheckOutcome {
        let scale = lhs.abs().max(rhs.abs()).max(1.0);
        let error = (lhs - rhs).abs() / scale;
        let (w, p) = (self.width, self.precision);
        let report = format!("{name}\n{what}: {lhs:>w$.p$e} vs {rhs:>w$.p$e}, relative difference {error:.3e}\n");
        CheckOutcome {
            name: name.to_string(),
            passed: error <= 1e-12_f64.max(self.tolerance * 1e-3),
            error,
            report,
        }
    }
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

fn random_vec<R: Rng>(rng: &mut R, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Runs the named checks at `(uo, un, z)` with random directions from `rng`.
pub fn check_dynamic_constraint<C, R>(
    con: &C,
    validator: &ValidateFunction,
    at: &Step<'_>,
    checks: &[&str],
    rng: &mut R,
) -> Result<Vec<CheckOutcome>, KError>
where
    C: DynamicConstraint + ?Sized,
    R: Rng,
{
    let (ns, nz) = (con.state_dim(), con.control_dim());
    if at.uo.len() != ns || at.un.len() != ns || at.z.len() != nz {
        return Err(KError::DimensionMismatch(format!(
            "constraint expects states of {ns} and controls of {nz}, got uo={} un={} z={}",
            at.uo.len(),
            at.un.len(),
            at.z.len()
        )));
    }
    let vs = random_vec(rng, ns);
    let vz = random_vec(rng, nz);
    let w = random_vec(rng, ns);

    let mut out = Vec::with_capacity(checks.len());
    for &name in checks {
        let outcome = match name {
            "applyJacobian_uo" => {
                let mut jv = vec![0.0; ns];
                con.apply_jacobian_uo(&mut jv, &vs, at);
                let f = |x: &[f64], c: &mut [f64]| con.value(c, &Step { uo: x, ..*at });
                validator.derivative_table(name, f, at.uo, &vs, &jv)
            }
            "applyJacobian_un" => {
                let mut jv = vec![0.0; ns];
                con.apply_jacobian_un(&mut jv, &vs, at);
                let f = |x: &[f64], c: &mut [f64]| con.value(c, &Step { un: x, ..*at });
                validator.derivative_table(name, f, at.un, &vs, &jv)
            }
            "applyJacobian_z" => {
                let mut jv = vec![0.0; ns];
                con.apply_jacobian_z(&mut jv, &vz, at);
                let f = |x: &[f64], c: &mut [f64]| con.value(c, &Step { z: x, ..*at });
                validator.derivative_table(name, f, at.z, &vz, &jv)
            }
            "applyAdjointJacobian_uo" | "applyAdjointJacobian_un" | "applyAdjointJacobian_z" => {
                let v: &[f64] = if name.ends_with("_z") { &vz } else { &vs };
                let mut jv = vec![0.0; ns];
                let mut ajw = vec![0.0; v.len()];
                match name {
                    "applyAdjointJacobian_uo" => {
                        con.apply_jacobian_uo(&mut jv, v, at);
                        con.apply_adjoint_jacobian_uo(&mut ajw, &w, at);
                    }
                    "applyAdjointJacobian_un" => {
                        con.apply_jacobian_un(&mut jv, v, at);
                        con.apply_adjoint_jacobian_un(&mut ajw, &w, at);
                    }
                    _ => {
                        con.apply_jacobian_z(&mut jv, v, at);
                        con.apply_adjoint_jacobian_z(&mut ajw, &w, at);
                    }
                }
                validator.consistency(name, dot(&w, &jv), dot(&ajw, v), "<w, J v> vs <J* w, v>")
            }
            "applyInverseJacobian_un" => {
                let (mut jv, mut back) = (vec![0.0; ns], vec![0.0; ns]);
                con.apply_jacobian_un(&mut jv, &vs, at);
                con.apply_inverse_jacobian_un(&mut back, &jv, at)?;
                let diff: Vec<f64> = back.iter().zip(&vs).map(|(a, b)| a - b).collect();
                validator.consistency(name, norm(&diff), 0.0, "|J^-1 J v - v|")
            }
            "applyInverseAdjointJacobian_un" => {
                let (mut ajw, mut back) = (vec![0.0; ns], vec![0.0; ns]);
                con.apply_adjoint_jacobian_un(&mut ajw, &w, at);
                con.apply_inverse_adjoint_jacobian_un(&mut back, &ajw, at)?;
                let diff: Vec<f64> = back.iter().zip(&w).map(|(a, b)| a - b).collect();
                validator.consistency(name, norm(&diff), 0.0, "|J^-* J* w - w|")
            }
            "applyAdjointHessian_uo_uo" => {
                let mut hv = vec![0.0; ns];
                con.apply_adjoint_hessian_uo_uo(&mut hv, &w, &vs, at);
                let g = |x: &[f64], g: &mut [f64]| con.apply_adjoint_jacobian_uo(g, &w, &Step { uo: x, ..*at });
                validator.derivative_table(name, g, at.uo, &vs, &hv)
            }
            "applyAdjointHessian_un_un" => {
                let mut hv = vec![0.0; ns];
                con.apply_adjoint_hessian_un_un(&mut hv, &w, &vs, at);
                let g = |x: &[f64], g: &mut [f64]| con.apply_adjoint_jacobian_un(g, &w, &Step { un: x, ..*at });
                validator.derivative_table(name, g, at.un, &vs, &hv)
            }
            other => return Err(KError::invalid("check", format!("unknown check `{other}`"))),
        };
        info!(
            "{}: {} (error {:.3e})",
            outcome.name,
            if outcome.passed { "passed" } else { "FAILED" },
            outcome.error
        );
        out.push(outcome);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::VanDerPol;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn steps_are_powers_of_ten() {
        let v = ValidateFunction::new(1, 3, 20, 11).unwrap();
        assert_eq!(v.steps(), vec![1.0, 0.1, 0.01]);
        assert!(ValidateFunction::new(5, 3, 20, 11).is_err());
    }

    #[test]
    fn stencils_differentiate_a_cubic() {
        for order in 1..=4 {
            let v = ValidateFunction::new(order, 8, 12, 4).unwrap();
            let f = |x: &[f64], y: &mut [f64]| y[0] = x[0].powi(3);
            let out = v.derivative_table("cubic", f, &[2.0], &[1.0], &[12.0]);
            assert!(out.passed, "order {order}: {}", out.report);
        }
    }

    #[test]
    fn wrong_jacobian_is_caught() {
        let v = ValidateFunction::default();
        let f = |x: &[f64], y: &mut [f64]| y[0] = x[0].sin();
        let out = v.derivative_table("sin", f, &[0.5], &[1.0], &[0.5f64.cos() + 1e-3]);
        assert!(!out.passed);
    }

    #[test]
    fn unknown_check_is_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let at = Step { uo: &[0.1, 0.2], un: &[0.3, 0.4], z: &[0.5] };
        let err = check_dynamic_constraint(&VanDerPol::default(), &ValidateFunction::default(), &at, &["nope"], &mut rng);
        assert!(matches!(err, Err(KError::InvalidParameter { .. })));
    }
}
