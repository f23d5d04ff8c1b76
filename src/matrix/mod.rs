//! Matrix module: distributed sparse matrices, vectors, and the operations built on them.

pub mod combine;
pub mod dense;
pub mod diagonal;
pub mod product;
pub mod sparse;
pub mod vector;

pub use combine::{ShiftedOperator, two_matrix_add};
pub use dense::DenseLu;
pub use diagonal::lumped_inverse;
pub use product::{galerkin_product, multiply, transpose};
pub use sparse::{CsrBuilder, CsrMatrix};
pub use vector::{DistVector, MultiVector};
