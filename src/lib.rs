//! edgesolve: preconditioned CG for shifted edge-element operators
//!
//! This crate assembles the discrete operators of a lowest-order Maxwell problem, forms the
//! shifted system `S + scaling * M1` and the lumped inverse of the nodal mass matrix, and solves
//! the system with a right-preconditioned conjugate-gradient method. Matrices and vectors are
//! distributed by contiguous row partitions over an explicit communicator.

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod driver;
pub mod dynamic;
pub mod error;
pub mod io;
pub mod matrix;
pub mod mesh;
pub mod preconditioner;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use core::*;
pub use error::*;
pub use matrix::*;
pub use parallel::{Comm, RowPartition, SerialComm, ThreadComm, UniverseComm};
pub use preconditioner::*;
pub use solver::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
