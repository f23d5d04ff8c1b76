//! Linear problem context: operator, preconditioner and solver options in one place.
//!
//! `KspContext` plays the role of a preconditioned linear problem. Construct it from the system
//! matrix and [`SolverOptions`], attach a preconditioner (directly or from a [`PC`] description),
//! then call [`KspContext::solve`] as many times as needed.

use crate::config::SolverOptions;
use crate::context::pc_context::{AuxiliaryData, PC};
use crate::error::KError;
use crate::matrix::{CsrMatrix, DistVector};
use crate::preconditioner::Preconditioner;
use crate::solver::{CgSolver, LinearSolver};
use crate::utils::convergence::SolveStats;

pub struct KspContext<'a> {
    /// The system matrix.
    pub a: &'a CsrMatrix,
    /// Optional preconditioner, applied on the right.
    pub pc: Option<Box<dyn Preconditioner>>,
    pub options: SolverOptions,
    /// Residual norms of the most recent solve.
    pub residual_history: Vec<f64>,
}

impl<'a> KspContext<'a> {
    pub fn new(a: &'a CsrMatrix, options: SolverOptions) -> Self {
        Self {
            a,
            pc: None,
            options,
            residual_history: Vec::new(),
        }
    }

    pub fn with_pc(mut self, pc: Box<dyn Preconditioner>) -> Self {
        self.pc = Some(pc);
        self
    }

    /// Builds and attaches the preconditioner described by `pc`. Collective.
    pub fn set_pc(&mut self, pc: &PC, aux: Option<&AuxiliaryData<'_>>) -> Result<(), KError> {
        self.pc = Some(pc.build(self.a, aux)?);
        Ok(())
    }

    /// Solves `A x = b` with CG; `x` holds the initial guess on entry. Collective.
    pub fn solve(&mut self, b: &[f64], x: &mut [f64]) -> Result<SolveStats<f64>, KError> {
        let mut solver = CgSolver::from_options(&self.options);
        let stats = solver.solve(self.a, self.pc.as_deref(), b, x);
        self.residual_history = std::mem::take(&mut solver.residual_history);
        stats
    }

    /// [`KspContext::solve`] on distributed vectors, checking their partitions first.
    pub fn solve_vec(&mut self, b: &DistVector, x: &mut DistVector) -> Result<SolveStats<f64>, KError> {
        let rows = self.a.row_partition();
        if !rows.is_compatible(b.map()) || !rows.is_compatible(x.map()) {
            return Err(KError::IncompatiblePartition(format!(
                "system rows {:?}, b {:?}, x {:?}",
                rows,
                b.map(),
                x.map()
            )));
        }
        self.solve(b.local(), x.local_mut())
    }
}
