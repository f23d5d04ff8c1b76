//! Structured test meshes.

pub mod hex_complex;

pub use hex_complex::HexComplex;
