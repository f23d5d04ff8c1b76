//! Lumped (row-sum) inverse of a mass matrix.

use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use log::debug;

/// Diagonal matrix whose `i`-th entry is `1 / sum_j M[i, j]`. Collective.
///
/// The result shares the row partition of `m` and is square on it. Any row whose sum is not
/// strictly positive (zero, negative or NaN) fails with [`KError::SingularOperator`] naming the
/// lowest such global row; every rank returns the same error.
pub fn lumped_inverse(m: &CsrMatrix) -> Result<CsrMatrix, KError> {
    let first = m.row_partition().local_range().start;
    let comm = m.row_partition().comm();
    let mut diag = m.row_sums();
    // `!(x > 0)` also rejects NaN
    let local_bad = diag.iter().position(|d| !(*d > 0.0));
    let bad = comm.all_reduce_min(local_bad.map_or(f64::INFINITY, |i| (first + i) as f64));
    if bad.is_finite() {
        let row = bad as usize;
        let mine = local_bad.filter(|&i| first + i == row).map_or(0.0, |i| diag[i]);
        return Err(KError::SingularOperator { row, row_sum: comm.all_reduce(mine) });
    }
    diag.iter_mut().for_each(|d| *d = 1.0 / *d);
    debug!("lumped inverse over {} local rows", diag.len());
    CsrMatrix::from_diagonal(m.row_partition().clone(), diag)
}
