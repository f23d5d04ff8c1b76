//! Context types that tie a linear problem together.
//!
//! Modules:
//! - [`ksp_context`]: `KspContext`, the operator + preconditioner + options bundle that runs CG.
//! - [`pc_context`]: the `PC` preconditioner description and its factory.
//!
//! # Example
//! ```rust,ignore
//! use edgesolve::context::{KspContext, pc_context::PC};
//! let mut ksp = KspContext::new(&sm, SolverOptions::default());
//! ksp.set_pc(&PC::from_params(&params)?, Some(&aux))?;
//! let stats = ksp.solve(&b, &mut x)?;
//! ```

pub mod ksp_context;
pub use ksp_context::KspContext;
pub mod pc_context;
