//! Inner products on slices.
//!
//! The local `()` implementation sums the calling rank's entries (rayon-parallel when the `rayon`
//! feature is on); [`DistributedInnerProduct`] adds a global reduction through a [`Comm`].

use crate::core::traits::InnerProduct;
use crate::parallel::Comm;
use num_traits::Float;

/// Implements the local inner product and norm for slices, with optional Rayon parallelism.
impl<T: Float + From<f64> + Send + Sync> InnerProduct<[T]> for () {
    type Scalar = T;
    /// Computes the dot product of two vectors: `x^T y`.
    fn dot(&self, x: &[T], y: &[T]) -> T {
        assert_eq!(x.len(), y.len(), "Vectors must have the same length");
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            x.par_iter()
                .zip(y.par_iter())
                .map(|(xi, yi)| *xi * *yi)
                .reduce(|| T::zero(), |acc, v| acc + v)
        }
        #[cfg(not(feature = "rayon"))]
        {
            x.iter()
                .zip(y.iter())
                .map(|(xi, yi)| *xi * *yi)
                .fold(T::zero(), |acc, v| acc + v)
        }
    }
    /// Computes the Euclidean norm of a vector: `||x||_2`.
    fn norm(&self, x: &[T]) -> T {
        self.dot(x, x).sqrt()
    }
}

/// Global inner product over the ranks of a communicator.
///
/// Every rank passes its local slices; the local partial sums are combined with one
/// `all_reduce` per call, so all ranks must call `dot`/`norm` in the same order.
#[derive(Clone, Copy)]
pub struct DistributedInnerProduct<'a> {
    /// Communicator the vectors are distributed over.
    pub comm: &'a dyn Comm,
}

impl<'a> DistributedInnerProduct<'a> {
    pub fn new(comm: &'a dyn Comm) -> Self {
        Self { comm }
    }
}

impl InnerProduct<[f64]> for DistributedInnerProduct<'_> {
    type Scalar = f64;
    fn dot(&self, x: &[f64], y: &[f64]) -> f64 {
        let local = InnerProduct::<[f64]>::dot(&(), x, y);
        if self.comm.size() == 1 {
            return local;
        }
        self.comm.all_reduce(local)
    }
    fn norm(&self, x: &[f64]) -> f64 {
        self.dot(x, x).sqrt()
    }
}
