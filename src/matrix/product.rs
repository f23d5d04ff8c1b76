//! Sparse transpose and products.
//!
//! The second operand of a product and the transposed matrix are replicated on every rank, then
//! each rank computes the rows it owns. These are setup-time kernels for building auxiliary and
//! coarse operators; the solve phase only uses SpMV.

use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::parallel::RowPartition;

/// `Aᵀ`, partitioned by `A`'s domain (rows) and row (columns) partitions. Collective.
pub fn transpose(a: &CsrMatrix) -> Result<CsrMatrix, KError> {
    let full = a.replicate();
    let (m, n) = (full.global_nrows(), full.global_ncols());
    let mut counts = vec![0usize; n + 1];
    for &c in full.col_idx() {
        counts[c + 1] += 1;
    }
    for j in 0..n {
        counts[j + 1] += counts[j];
    }
    let row_ptr = counts.clone();
    let mut next = counts;
    let mut col_idx = vec![0usize; full.nnz()];
    let mut values = vec![0.0; full.nnz()];
    // rows are visited in order, so each transposed row comes out sorted
    for i in 0..m {
        let (cols, vals) = full.row(i);
        for (&c, &v) in cols.iter().zip(vals) {
            let slot = next[c];
            col_idx[slot] = i;
            values[slot] = v;
            next[c] += 1;
        }
    }
    let t = CsrMatrix::from_csr(RowPartition::serial(n), RowPartition::serial(m), row_ptr, col_idx, values)?;
    t.distribute(a.domain_partition().clone(), a.row_partition().clone())
}

/// `C = A · B` (Gustavson row-by-row accumulation). Collective.
pub fn multiply(a: &CsrMatrix, b: &CsrMatrix) -> Result<CsrMatrix, KError> {
    if a.global_ncols() != b.global_nrows() {
        return Err(KError::DimensionMismatch(format!(
            "cannot multiply {}x{} by {}x{}",
            a.global_nrows(),
            a.global_ncols(),
            b.global_nrows(),
            b.global_ncols()
        )));
    }
    let bf = b.replicate();
    let ncols = bf.global_ncols();
    let mut acc = vec![0.0; ncols];
    let mut marker = vec![usize::MAX; ncols];
    let mut touched: Vec<usize> = Vec::new();
    let mut row_ptr = Vec::with_capacity(a.local_nrows() + 1);
    let mut col_idx = Vec::new();
    let mut values = Vec::new();
    row_ptr.push(0);
    for i in 0..a.local_nrows() {
        touched.clear();
        let (acols, avals) = a.row(i);
        for (&k, &aik) in acols.iter().zip(avals) {
            let (bcols, bvals) = bf.row(k);
            for (&j, &bkj) in bcols.iter().zip(bvals) {
                if marker[j] != i {
                    marker[j] = i;
                    acc[j] = 0.0;
                    touched.push(j);
                }
                acc[j] += aik * bkj;
            }
        }
        touched.sort_unstable();
        for &j in &touched {
            col_idx.push(j);
            values.push(acc[j]);
        }
        row_ptr.push(col_idx.len());
    }
    CsrMatrix::from_csr(
        a.row_partition().clone(),
        b.domain_partition().clone(),
        row_ptr,
        col_idx,
        values,
    )
}

/// Galerkin triple product `Pᵀ A P`. Collective.
pub fn galerkin_product(p: &CsrMatrix, a: &CsrMatrix) -> Result<CsrMatrix, KError> {
    let ap = multiply(a, p)?;
    multiply(&transpose(p)?, &ap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_sparse(m: usize, n: usize, density: f64, seed: u64) -> CsrMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut triplets = Vec::new();
        for i in 0..m {
            for j in 0..n {
                if rng.r#gen::<f64>() < density {
                    triplets.push((i, j, rng.r#gen::<f64>() - 0.5));
                }
            }
        }
        CsrMatrix::from_triplets(RowPartition::serial(m), RowPartition::serial(n), &triplets).unwrap()
    }

    #[test]
    fn transpose_matches_dense() {
        let a = random_sparse(7, 5, 0.4, 1);
        let t = transpose(&a).unwrap();
        let (ad, td) = (a.to_dense(), t.to_dense());
        assert_eq!((t.global_nrows(), t.global_ncols()), (5, 7));
        for i in 0..7 {
            for j in 0..5 {
                assert_eq!(ad[(i, j)], td[(j, i)]);
            }
        }
    }

    #[test]
    fn multiply_matches_dense() {
        let a = random_sparse(6, 4, 0.5, 2);
        let b = random_sparse(4, 5, 0.5, 3);
        let c = multiply(&a, &b).unwrap().to_dense();
        let expected = a.to_dense() * b.to_dense();
        for i in 0..6 {
            for j in 0..5 {
                assert_relative_eq!(c[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn galerkin_of_identity_is_ptp() {
        let p = random_sparse(6, 3, 0.6, 4);
        let a = CsrMatrix::identity(RowPartition::serial(6));
        let c = galerkin_product(&p, &a).unwrap().to_dense();
        let pd = p.to_dense();
        let expected = pd.transpose() * pd.as_ref();
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(c[(i, j)], expected[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let a = random_sparse(3, 4, 0.5, 5);
        assert!(matches!(multiply(&a, &a), Err(KError::DimensionMismatch(_))));
    }
}
