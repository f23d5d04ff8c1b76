//! Weighted sums of two matrices: assembled (`two_matrix_add`) or matrix-free (`ShiftedOperator`).

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::matrix::sparse::CsrMatrix;
use crate::parallel::RowPartition;

fn ensure_same_shape(a: &CsrMatrix, b: &CsrMatrix) -> Result<(), KError> {
    a.row_partition().ensure_compatible(b.row_partition(), "matrix add (rows)")?;
    if a.global_ncols() != b.global_ncols() {
        return Err(KError::IncompatiblePartition(format!(
            "matrix add (columns): {} vs {}",
            a.global_ncols(),
            b.global_ncols()
        )));
    }
    Ok(())
}

/// `C = alpha * A + beta * B`.
///
/// Rows are merged column by column, so the pattern of `C` is the union of the operand patterns.
/// An operand with a coefficient of exactly zero contributes neither entries nor structure.
/// The result lives on `A`'s row and domain partitions.
pub fn two_matrix_add(a: &CsrMatrix, alpha: f64, b: &CsrMatrix, beta: f64) -> Result<CsrMatrix, KError> {
    ensure_same_shape(a, b)?;
    let use_a = alpha != 0.0;
    let use_b = beta != 0.0;
    let n = a.local_nrows();
    let mut row_ptr = Vec::with_capacity(n + 1);
    let mut col_idx = Vec::with_capacity(a.nnz() + b.nnz());
    let mut values = Vec::with_capacity(a.nnz() + b.nnz());
    row_ptr.push(0);
    for i in 0..n {
        let (ac, av) = if use_a { a.row(i) } else { (&[][..], &[][..]) };
        let (bc, bv) = if use_b { b.row(i) } else { (&[][..], &[][..]) };
        let (mut p, mut q) = (0, 0);
        while p < ac.len() || q < bc.len() {
            let take_a = q == bc.len() || (p < ac.len() && ac[p] <= bc[q]);
            let take_b = p == ac.len() || (q < bc.len() && bc[q] <= ac[p]);
            let (col, v) = match (take_a, take_b) {
                (true, true) => {
                    let e = (ac[p], alpha * av[p] + beta * bv[q]);
                    p += 1;
                    q += 1;
                    e
                }
                (true, false) => {
                    let e = (ac[p], alpha * av[p]);
                    p += 1;
                    e
                }
                _ => {
                    let e = (bc[q], beta * bv[q]);
                    q += 1;
                    e
                }
            };
            col_idx.push(col);
            values.push(v);
        }
        row_ptr.push(col_idx.len());
    }
    CsrMatrix::from_csr(
        a.row_partition().clone(),
        a.domain_partition().clone(),
        row_ptr,
        col_idx,
        values,
    )
}

/// Lazy `alpha * A + beta * B`, applied as two products and an axpy.
pub struct ShiftedOperator<'a> {
    a: &'a CsrMatrix,
    alpha: f64,
    b: &'a CsrMatrix,
    beta: f64,
}

impl<'a> ShiftedOperator<'a> {
    pub fn new(a: &'a CsrMatrix, alpha: f64, b: &'a CsrMatrix, beta: f64) -> Result<Self, KError> {
        ensure_same_shape(a, b)?;
        Ok(Self { a, alpha, b, beta })
    }
}

impl LinearOperator for ShiftedOperator<'_> {
    fn row_partition(&self) -> &RowPartition {
        self.a.row_partition()
    }
    fn domain_partition(&self) -> &RowPartition {
        self.a.domain_partition()
    }
    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        self.a.apply(x, y)?;
        let mut tmp = vec![0.0; y.len()];
        self.b.apply(x, &mut tmp)?;
        y.iter_mut()
            .zip(&tmp)
            .for_each(|(yi, &ti)| *yi = self.alpha * *yi + self.beta * ti);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(n: usize) -> RowPartition {
        RowPartition::serial(n)
    }

    #[test]
    fn union_pattern_and_overlap() {
        let a = CsrMatrix::from_triplets(p(2), p(3), &[(0, 0, 1.0), (0, 2, 2.0), (1, 1, 3.0)]).unwrap();
        let b = CsrMatrix::from_triplets(p(2), p(3), &[(0, 1, 1.0), (0, 2, 1.0), (1, 0, 4.0)]).unwrap();
        let c = two_matrix_add(&a, 1.0, &b, 2.0).unwrap();
        assert_eq!(c.col_idx(), &[0, 1, 2, 0, 1]);
        assert_eq!(c.values(), &[1.0, 2.0, 4.0, 8.0, 3.0]);
    }

    #[test]
    fn zero_coefficient_drops_structure() {
        let a = CsrMatrix::from_triplets(p(2), p(2), &[(0, 0, 1.0), (1, 1, 2.0)]).unwrap();
        let b = CsrMatrix::from_triplets(p(2), p(2), &[(0, 1, 5.0), (1, 0, 6.0)]).unwrap();
        assert_eq!(two_matrix_add(&a, 1.0, &b, 0.0).unwrap(), a);
        assert_eq!(two_matrix_add(&a, 0.0, &b, 1.0).unwrap().col_idx(), b.col_idx());
    }

    #[test]
    fn shifted_operator_matches_assembled_sum() {
        let a = CsrMatrix::from_triplets(p(2), p(2), &[(0, 0, 2.0), (0, 1, -1.0), (1, 1, 2.0)]).unwrap();
        let b = CsrMatrix::from_triplets(p(2), p(2), &[(0, 0, 1.0), (1, 0, 1.0)]).unwrap();
        let c = two_matrix_add(&a, 1.0, &b, 0.5).unwrap();
        let lazy = ShiftedOperator::new(&a, 1.0, &b, 0.5).unwrap();
        let x = [1.0, -2.0];
        let (mut y1, mut y2) = (vec![0.0; 2], vec![0.0; 2]);
        c.apply(&x, &mut y1).unwrap();
        lazy.apply(&x, &mut y2).unwrap();
        assert_eq!(y1, y2);
    }

    #[test]
    fn mismatched_domains_are_rejected() {
        let a = CsrMatrix::identity(p(2));
        let b = CsrMatrix::from_triplets(p(2), p(3), &[(0, 2, 1.0)]).unwrap();
        assert!(matches!(two_matrix_add(&a, 1.0, &b, 1.0), Err(KError::IncompatiblePartition(_))));
    }
}
