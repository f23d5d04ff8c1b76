//! Core linear-algebra traits: distributed operators and inner products.

pub mod traits;
pub mod wrappers;

pub use traits::{InnerProduct, LinearOperator};
pub use wrappers::DistributedInnerProduct;
