//! Krylov solver interfaces.

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::SolveStats;

pub use crate::utils::convergence::SolverState;

/// Common interface for iterative solvers on distributed operators.
pub trait LinearSolver {
    /// Solve A·x = b, writing the result into `x` (which holds the initial guess on entry).
    ///
    /// `b` and `x` are the calling rank's slices. Collective.
    fn solve(
        &mut self,
        a: &dyn LinearOperator,
        pc: Option<&dyn Preconditioner>,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<SolveStats<f64>, KError>;
}

/// Decides whether a finished solve counts as a success.
///
/// Kept apart from the solver's own iteration limit: a run may be allowed many iterations yet
/// only be accepted if it converged quickly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptancePolicy {
    /// Accepted iff `converged && iterations < max_accepted_iterations`.
    pub max_accepted_iterations: usize,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self { max_accepted_iterations: 50 }
    }
}

impl AcceptancePolicy {
    pub fn new(max_accepted_iterations: usize) -> Self {
        Self { max_accepted_iterations }
    }

    pub fn accepts(&self, stats: &SolveStats<f64>) -> bool {
        stats.converged && stats.iterations < self.max_accepted_iterations
    }
}

pub mod cg;
pub use cg::CgSolver;
