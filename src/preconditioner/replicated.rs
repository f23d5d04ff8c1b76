//! Runs a serial preconditioner on every rank against the full residual.

use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::parallel::RowPartition;
use crate::preconditioner::Preconditioner;

/// Gathers the distributed residual, applies `inner` to the whole vector and keeps the local slice.
///
/// Every rank holds an identical copy of `inner`, so the assembled result equals the serial
/// preconditioner applied to the global residual.
pub struct Replicated<P> {
    map: RowPartition,
    inner: P,
}

impl<P: Preconditioner> Replicated<P> {
    pub fn new(map: RowPartition, inner: P) -> Self {
        Self { map, inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: Preconditioner> Preconditioner for Replicated<P> {
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        if r.len() != self.map.local_len() || z.len() != r.len() {
            return Err(KError::DimensionMismatch(format!(
                "replicated preconditioner: partition owns {}, got r={} z={}",
                self.map.local_len(),
                r.len(),
                z.len()
            )));
        }
        let full_r = self.map.gather_all(r);
        let mut full_z = vec![0.0; full_r.len()];
        self.inner.apply(&full_r, &mut full_z)?;
        z.copy_from_slice(self.map.local_slice(&full_z));
        Ok(())
    }
}

/// The preconditioner as a distributed operator on its row partition.
impl<P: Preconditioner> LinearOperator for Replicated<P> {
    fn row_partition(&self) -> &RowPartition {
        &self.map
    }
    fn domain_partition(&self) -> &RowPartition {
        &self.map
    }
    fn apply(&self, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        Preconditioner::apply(self, x, y)
    }
}
