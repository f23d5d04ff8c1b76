//! Conjugate Gradient with right preconditioning per Saad §9.2.
//!
//! The monitored quantity is the true residual `‖b − A x_k‖`, updated recursively. All inner
//! products are global reductions over the operator's communicator, so every rank runs the same
//! iteration count and reaches the same decision.

use crate::config::{SolverOptions, Verbosity};
use crate::core::traits::{InnerProduct, LinearOperator};
use crate::core::wrappers::DistributedInnerProduct;
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::LinearSolver;
use crate::utils::convergence::{Convergence, SolveStats, SolverState};
use log::{debug, error, info, warn};

pub struct CgSolver {
    pub conv: Convergence<f64>,
    pub verbosity: Verbosity,
    /// Status lines every `output_frequency` iterations; 0 turns them off.
    pub output_frequency: usize,
    pub monitor: Option<Box<dyn FnMut(usize, f64)>>,
    /// `‖r_k‖` for k = 0, 1, ... of the last solve.
    pub residual_history: Vec<f64>,
    state: SolverState,
    verbose_rank: bool,
}

impl CgSolver {
    pub fn new(tol: f64, max_iters: usize) -> Self {
        Self {
            conv: Convergence { tol, max_iters },
            verbosity: Verbosity::default(),
            output_frequency: 1,
            monitor: None,
            residual_history: Vec::new(),
            state: SolverState::Initialized,
            verbose_rank: true,
        }
    }

    pub fn from_options(opts: &SolverOptions) -> Self {
        Self::new(opts.tolerance, opts.max_iterations)
            .with_verbosity(opts.verbosity)
            .with_output_frequency(opts.output_frequency)
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_output_frequency(mut self, every: usize) -> Self {
        self.output_frequency = every;
        self
    }

    pub fn with_monitor<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, f64) + 'static,
    {
        self.monitor = Some(Box::new(f));
        self
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub fn clear_history(&mut self) {
        self.residual_history.clear();
    }

    fn record(&mut self, k: usize, res: f64, res0: f64) {
        self.residual_history.push(res);
        if let Some(ref mut monitor) = self.monitor {
            monitor(k, res);
        }
        debug!("cg iter {k}: |r| = {res:.6e}");
        let wants_status = self
            .verbosity
            .intersects(Verbosity::STATUS_TEST_DETAILS | Verbosity::ITERATION_DETAILS);
        if self.verbose_rank && wants_status && self.output_frequency > 0 && k % self.output_frequency == 0 {
            let rel = if res0 > 0.0 { res / res0 } else { 0.0 };
            info!(
                "CG iter {k:4}: |r|/|r0| = {rel:.6e} (tol {:.1e})",
                self.conv.tol
            );
        }
    }

    fn fail(&mut self, iteration: usize, err: KError) -> KError {
        self.state = SolverState::Failed;
        if self.verbose_rank && self.verbosity.contains(Verbosity::ERRORS) {
            error!("CG failed at iteration {iteration}: {err}");
        }
        err.at_iteration(iteration)
    }

    fn finish(&mut self, state: SolverState, k: usize, res0: f64, res: f64) -> SolveStats<f64> {
        self.state = state;
        if self.verbose_rank {
            if state == SolverState::MaxIterReached && self.verbosity.contains(Verbosity::WARNINGS) {
                warn!(
                    "CG reached {k} iterations without convergence (|r|/|r0| = {:.3e})",
                    if res0 > 0.0 { res / res0 } else { 0.0 }
                );
            }
            if self.verbosity.contains(Verbosity::FINAL_SUMMARY) {
                info!("CG finished: {state:?} after {k} iterations, |r| = {res:.6e}, |r0| = {res0:.6e}");
            }
        }
        self.conv.stats(state, k, res0, res)
    }
}

fn apply_pc(pc: Option<&dyn Preconditioner>, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
    match pc {
        Some(pc) => pc.apply(r, z),
        None => {
            z.copy_from_slice(r);
            Ok(())
        }
    }
}

impl LinearSolver for CgSolver {
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        pc: Option<&dyn Preconditioner>,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<SolveStats<f64>, KError> {
        let map = a.row_partition();
        let n = map.local_len();
        if b.len() != n || x.len() != n || !map.is_compatible(a.domain_partition()) {
            return Err(KError::DimensionMismatch(format!(
                "cg needs a square operator and slices of {n} rows, got b={} x={}",
                b.len(),
                x.len()
            )));
        }
        let comm = map.comm().clone();
        self.verbose_rank = comm.rank() == 0;
        self.state = SolverState::Initialized;
        self.residual_history.clear();
        let ip = DistributedInnerProduct::new(&*comm);

        let mut r = vec![0.0; n];
        if let Err(e) = a.apply(x, &mut r) {
            return Err(self.fail(0, e));
        }
        for (ri, &bi) in r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }
        let res0 = ip.norm(&r[..]);
        self.record(0, res0, res0);
        let state = self.conv.check(res0, res0, 0);
        if state != SolverState::Iterating {
            return Ok(self.finish(state, 0, res0, res0));
        }
        self.state = SolverState::Iterating;

        let mut z = vec![0.0; n];
        if let Err(e) = apply_pc(pc, &r, &mut z) {
            return Err(self.fail(0, e));
        }
        // r is nonzero here, so rᵀz must be positive for an SPD preconditioner
        let mut rz = ip.dot(&r[..], &z[..]);
        if !(rz > 0.0) {
            return Err(self.fail(0, KError::IndefinitePreconditioner));
        }
        let mut p = z.clone();
        let mut ap = vec![0.0; n];

        let mut k = 0;
        loop {
            k += 1;
            if let Err(e) = a.apply(&p, &mut ap) {
                return Err(self.fail(k, e));
            }
            let p_ap = ip.dot(&p[..], &ap[..]);
            if !(p_ap > 0.0) {
                return Err(self.fail(k, KError::IndefiniteMatrix));
            }
            let alpha = rz / p_ap;
            for ((xi, ri), (&pi, &api)) in x.iter_mut().zip(r.iter_mut()).zip(p.iter().zip(&ap)) {
                *xi += alpha * pi;
                *ri -= alpha * api;
            }
            let res = ip.norm(&r[..]);
            self.record(k, res, res0);
            let state = self.conv.check(res, res0, k);
            if state != SolverState::Iterating {
                return Ok(self.finish(state, k, res0, res));
            }

            if let Err(e) = apply_pc(pc, &r, &mut z) {
                return Err(self.fail(k, e));
            }
            let rz_new = ip.dot(&r[..], &z[..]);
            if !(rz_new > 0.0) {
                return Err(self.fail(k, KError::IndefinitePreconditioner));
            }
            let beta = rz_new / rz;
            for (pi, &zi) in p.iter_mut().zip(&z) {
                *pi = zi + beta * *pi;
            }
            rz = rz_new;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CsrMatrix;
    use crate::parallel::RowPartition;
    use crate::preconditioner::Jacobi;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn dense(rows: &[&[f64]]) -> CsrMatrix {
        let n = rows.len();
        let p = RowPartition::serial(n);
        let t: Vec<_> = rows
            .iter()
            .enumerate()
            .flat_map(|(i, row)| row.iter().enumerate().filter(|(_, v)| **v != 0.0).map(move |(j, &v)| (i, j, v)))
            .collect();
        CsrMatrix::from_triplets(p.clone(), p, &t).unwrap()
    }

    #[test]
    fn cg_solves_simple_spd() {
        // SPD system: [[4,1],[1,3]] x = [1,2]
        let a = dense(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged, "CG did not converge");
        assert!(stats.iterations <= 2);
        assert_relative_eq!(x[0], 1.0 / 11.0, epsilon = 1e-8);
        assert_relative_eq!(x[1], 7.0 / 11.0, epsilon = 1e-8);
        assert_eq!(solver.state(), SolverState::Converged);
    }

    #[test]
    fn jacobi_preconditioned_solve() {
        // A = [[4,1,0],[1,3,1],[0,1,2]], x_true = [1,2,3]
        let a = dense(&[&[4.0, 1.0, 0.0], &[1.0, 3.0, 1.0], &[0.0, 1.0, 2.0]]);
        let b = vec![6.0, 10.0, 8.0];
        let mut x = vec![0.0; 3];
        let pc = Jacobi::from_matrix(&a);
        let stats = CgSolver::new(1e-12, 10).solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged);
        for (xi, ei) in x.iter().zip([1.0, 2.0, 3.0]) {
            assert_relative_eq!(*xi, ei, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_rhs_converges_in_zero_iterations() {
        let a = dense(&[&[2.0, 0.0], &[0.0, 2.0]]);
        let mut x = vec![0.0; 2];
        let stats = CgSolver::new(1e-4, 100).solve(&a, None, &[0.0, 0.0], &mut x).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn iteration_limit_is_not_an_error() {
        let n = 30;
        let p = RowPartition::serial(n);
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 2.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        let a = CsrMatrix::from_triplets(p.clone(), p, &t).unwrap();
        let mut x = vec![0.0; n];
        let mut solver = CgSolver::new(1e-14, 3);
        let stats = solver.solve(&a, None, &vec![1.0; n], &mut x).unwrap();
        assert!(!stats.converged);
        assert_eq!(stats.iterations, 3);
        assert_eq!(stats.state, SolverState::MaxIterReached);
        assert_eq!(solver.residual_history.len(), 4);
    }

    #[test]
    fn indefinite_matrix_fails_with_iteration() {
        let a = dense(&[&[1.0, 0.0], &[0.0, -1.0]]);
        let mut x = vec![0.0; 2];
        let mut solver = CgSolver::new(1e-10, 10);
        let err = solver.solve(&a, None, &[0.0, 1.0], &mut x).unwrap_err();
        assert!(matches!(
            err,
            KError::SolverFailure { iteration: 1, ref source } if matches!(**source, KError::IndefiniteMatrix)
        ));
        assert_eq!(solver.state(), SolverState::Failed);
    }

    #[test]
    fn diagonal_spd_converges_quickly_without_preconditioner() {
        // diag(1..=10): condition number 10
        let n = 10;
        let p = RowPartition::serial(n);
        let t: Vec<_> = (0..n).map(|i| (i, i, (i + 1) as f64)).collect();
        let a = CsrMatrix::from_triplets(p.clone(), p, &t).unwrap();
        let mut x = vec![0.0; n];
        let stats = CgSolver::new(1e-6, 100).solve(&a, None, &vec![1.0; n], &mut x).unwrap();
        assert!(stats.converged);
        assert!(stats.iterations <= 15, "took {} iterations", stats.iterations);
        for (i, xi) in x.iter().enumerate() {
            assert_relative_eq!(*xi, 1.0 / (i + 1) as f64, epsilon = 1e-5);
        }
    }

    #[test]
    fn iteration_limit_reports_last_residual() {
        let a = dense(&[&[1.0, 0.0, 0.0], &[0.0, 2.0, 0.0], &[0.0, 0.0, 3.0]]);
        let mut x = vec![0.0; 3];
        let mut solver = CgSolver::new(1e-14, 1);
        let stats = solver.solve(&a, None, &[1.0, 1.0, 1.0], &mut x).unwrap();
        assert_eq!(stats.state, SolverState::MaxIterReached);
        assert_eq!(stats.final_residual, solver.residual_history[1]);
        assert!(stats.final_residual < stats.initial_residual);
    }

    struct Zero;
    impl Preconditioner for Zero {
        fn apply(&self, _r: &[f64], z: &mut [f64]) -> Result<(), KError> {
            z.fill(0.0);
            Ok(())
        }
    }

    #[test]
    fn zero_preconditioner_is_blamed_at_iteration_zero() {
        let a = dense(&[&[2.0, 0.0], &[0.0, 2.0]]);
        let mut x = vec![0.0; 2];
        let err = CgSolver::new(1e-10, 10).solve(&a, Some(&Zero), &[1.0, 1.0], &mut x).unwrap_err();
        assert!(matches!(
            err,
            KError::SolverFailure { iteration: 0, ref source } if matches!(**source, KError::IndefinitePreconditioner)
        ));
    }

    struct Broken;
    impl Preconditioner for Broken {
        fn apply(&self, _r: &[f64], _z: &mut [f64]) -> Result<(), KError> {
            Err(KError::Unsupported("broken preconditioner"))
        }
    }

    #[test]
    fn preconditioner_error_is_wrapped() {
        let a = dense(&[&[2.0, 0.0], &[0.0, 2.0]]);
        let mut x = vec![0.0; 2];
        let err = CgSolver::new(1e-10, 10).solve(&a, Some(&Broken), &[1.0, 1.0], &mut x).unwrap_err();
        assert!(matches!(err, KError::SolverFailure { iteration: 0, .. }));
    }

    #[test]
    fn monitor_sees_every_residual() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let a = dense(&[&[4.0, 1.0], &[1.0, 3.0]]);
        let mut x = vec![0.0; 2];
        let mut solver = CgSolver::new(1e-10, 20).with_monitor(move |k, r| sink.borrow_mut().push((k, r)));
        let stats = solver.solve(&a, None, &[1.0, 2.0], &mut x).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), stats.iterations + 1);
        assert_eq!(seen[0].0, 0);
        assert_relative_eq!(seen[0].1, 5f64.sqrt(), epsilon = 1e-12);
    }
}
