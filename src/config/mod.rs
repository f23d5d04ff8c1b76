//! Configuration: solver options and preconditioner parameter lists.

pub mod options;
pub mod parameters;

pub use options::{SolverOptions, Verbosity};
pub use parameters::{ParamValue, ParameterList};
