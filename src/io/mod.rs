//! File input and output.

pub mod matrix_market;

pub use matrix_market::{
    MatrixMarketHeader, read_header, read_matrix, read_multivector, write_matrix, write_multivector,
};
