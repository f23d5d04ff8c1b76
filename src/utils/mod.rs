//! Solver bookkeeping: convergence criteria and phase timers.

pub mod convergence;
pub mod timing;

pub use convergence::{Convergence, SolveStats, SolverState};
pub use timing::{TimeFormat, TimeMonitor};
