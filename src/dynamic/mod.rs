//! Dynamic (time-step) constraints and their derivative checks.

pub mod check;
pub mod constraint;
pub mod vdp;

pub use check::{ALL_CHECKS, CheckOutcome, ValidateFunction, check_dynamic_constraint};
pub use constraint::{DynamicConstraint, Step};
pub use vdp::VanDerPol;
