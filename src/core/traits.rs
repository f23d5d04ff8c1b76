//! Core linear-algebra traits for edgesolve.

use crate::error::KError;
use crate::parallel::RowPartition;

/// Inner products & norms.
pub trait InnerProduct<V: ?Sized> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd + From<f64>;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// A distributed linear operator `y = A(x)`.
///
/// `x` is the calling rank's slice over [`LinearOperator::domain_partition`] and `y` its slice over
/// [`LinearOperator::row_partition`]. `apply` is collective: every rank must call it. It must be
/// linear and deterministic for a fixed input.
pub trait LinearOperator {
    /// Partition of the output (range) vector.
    fn row_partition(&self) -> &RowPartition;
    /// Partition of the input (domain) vector.
    fn domain_partition(&self) -> &RowPartition;
    /// Compute y = A · x.
    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError>;
}

impl<T: LinearOperator + ?Sized> LinearOperator for &T {
    fn row_partition(&self) -> &RowPartition {
        (**self).row_partition()
    }
    fn domain_partition(&self) -> &RowPartition {
        (**self).domain_partition()
    }
    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        (**self).apply(x, y)
    }
}
