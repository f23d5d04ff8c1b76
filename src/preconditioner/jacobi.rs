// Jacobi preconditioner implementation

use crate::error::KError;
use crate::matrix::CsrMatrix;
use crate::preconditioner::Preconditioner;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
///
/// Works on the locally owned rows only, so it needs no communication.
#[derive(Clone, Debug, Default)]
pub struct Jacobi {
    pub(crate) inv_diag: Vec<f64>,
}

impl Jacobi {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }

    pub fn from_matrix(a: &CsrMatrix) -> Self {
        let mut pc = Self::new();
        pc.inv_diag = inverse_diagonal(a);
        pc
    }
}

/// `1 / a_ii` for the local rows; rows without a (nonzero) diagonal get 0.
pub(crate) fn inverse_diagonal(a: &CsrMatrix) -> Vec<f64> {
    a.diagonal()
        .into_iter()
        .map(|d| if d != 0.0 { 1.0 / d } else { 0.0 })
        .collect()
}

impl Preconditioner for Jacobi {
    fn setup(&mut self, a: &CsrMatrix) -> Result<(), KError> {
        self.inv_diag = inverse_diagonal(a);
        Ok(())
    }

    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        if r.len() != self.inv_diag.len() || z.len() != r.len() {
            return Err(KError::DimensionMismatch(format!(
                "jacobi: set up for {} rows, got r={} z={}",
                self.inv_diag.len(),
                r.len(),
                z.len()
            )));
        }
        for ((zi, &ri), &di) in z.iter_mut().zip(r).zip(&self.inv_diag) {
            *zi = di * ri;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::RowPartition;

    #[test]
    fn scales_by_inverse_diagonal() {
        let p = RowPartition::serial(3);
        let a = CsrMatrix::from_triplets(p.clone(), p, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 4.0), (2, 0, 1.0)]).unwrap();
        let mut pc = Jacobi::new();
        pc.setup(&a).unwrap();
        let mut z = vec![0.0; 3];
        pc.apply(&[2.0, 2.0, 5.0], &mut z).unwrap();
        assert_eq!(z, vec![1.0, 0.5, 0.0]);
        assert!(pc.apply(&[1.0], &mut [0.0]).is_err());
    }
}
