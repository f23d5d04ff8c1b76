//! Dense LU (full pivoting, faer) for small replicated matrices such as the coarsest AMG level.

use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use faer::linalg::solvers::{FullPivLu, SolveCore};
use faer::{Conj, Mat, MatMut};

/// Cached factorization of `A + shift * I`.
pub struct DenseLu {
    factor: FullPivLu<f64>,
    n: usize,
}

impl DenseLu {
    /// Factor a square dense matrix.
    pub fn new(a: &Mat<f64>) -> Result<Self, KError> {
        if a.nrows() != a.ncols() {
            return Err(KError::FactorError(format!(
                "LU needs a square matrix, got {}x{}",
                a.nrows(),
                a.ncols()
            )));
        }
        let n = a.nrows();
        for j in 0..n {
            for i in 0..n {
                if !a[(i, j)].is_finite() {
                    return Err(KError::FactorError(format!("non-finite entry at ({i}, {j})")));
                }
            }
        }
        Ok(Self { factor: FullPivLu::new(a.as_ref()), n })
    }

    /// Factor a replicated sparse matrix after adding `regularization * mean(|diag|)` to the
    /// diagonal. Singular but semidefinite operators (curl-curl, nodal Laplacians without Dirichlet
    /// rows) then get a unique, symmetric pseudo-solve.
    pub fn from_sparse(a: &CsrMatrix, regularization: f64) -> Result<Self, KError> {
        if a.row_partition().is_distributed() {
            return Err(KError::Unsupported("dense LU of a distributed matrix"));
        }
        let mut dense = a.to_dense();
        let n = dense.nrows();
        if regularization > 0.0 && n > 0 {
            let mean = (0..n).map(|i| dense[(i, i)].abs()).sum::<f64>() / n as f64;
            let shift = regularization * if mean > 0.0 { mean } else { 1.0 };
            for i in 0..n {
                dense[(i, i)] += shift;
            }
        }
        Self::new(&dense)
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// `x = A⁻¹ b`.
    pub fn solve(&self, b: &[f64], x: &mut [f64]) {
        assert_eq!(b.len(), self.n);
        x.copy_from_slice(b);
        let x_mat = MatMut::from_column_major_slice_mut(x, self.n, 1);
        self.factor.solve_in_place_with_conj(Conj::No, x_mat);
    }
}
