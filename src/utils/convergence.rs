//! Convergence tracking & tolerance checks for iterative solvers.

/// Lifecycle of an iterative solve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverState {
    Initialized,
    Iterating,
    Converged,
    MaxIterReached,
    Failed,
}

/// Stopping criteria: relative residual `‖r_k‖ <= tol · ‖r_0‖` or `max_iters` iterations.
#[derive(Clone, Copy, Debug)]
pub struct Convergence<T> {
    pub tol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    pub initial_residual: T,
    pub final_residual: T,
    pub converged: bool,
    pub state: SolverState,
}

impl<T: Copy + num_traits::Float> Convergence<T> {
    /// State after iteration `i` given the current and initial residual norms.
    ///
    /// The comparison is inclusive and multiplies instead of dividing, so a zero initial residual
    /// converges immediately.
    pub fn check(&self, res_norm: T, res0_norm: T, i: usize) -> SolverState {
        if res_norm <= self.tol * res0_norm {
            SolverState::Converged
        } else if i >= self.max_iters {
            SolverState::MaxIterReached
        } else {
            SolverState::Iterating
        }
    }

    pub fn stats(&self, state: SolverState, iterations: usize, res0_norm: T, res_norm: T) -> SolveStats<T> {
        SolveStats {
            iterations,
            initial_residual: res0_norm,
            final_residual: res_norm,
            converged: state == SolverState::Converged,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converged_is_inclusive() {
        let c = Convergence { tol: 0.5, max_iters: 10 };
        assert_eq!(c.check(0.5, 1.0, 3), SolverState::Converged);
        assert_eq!(c.check(0.6, 1.0, 3), SolverState::Iterating);
    }

    #[test]
    fn max_iters_is_not_convergence() {
        let c = Convergence { tol: 1e-8, max_iters: 4 };
        let state = c.check(1.0, 1.0, 4);
        assert_eq!(state, SolverState::MaxIterReached);
        assert!(!c.stats(state, 4, 1.0, 1.0).converged);
    }

    #[test]
    fn zero_initial_residual_converges() {
        let c = Convergence { tol: 1e-4, max_iters: 0 };
        assert_eq!(c.check(0.0_f64, 0.0, 0), SolverState::Converged);
    }
}
