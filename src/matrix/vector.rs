//! Distributed vectors and multivectors over a [`RowPartition`].

use crate::core::traits::InnerProduct;
use crate::core::wrappers::DistributedInnerProduct;
use crate::error::KError;
use crate::parallel::RowPartition;

/// The calling rank's block of a distributed vector.
#[derive(Clone, Debug)]
pub struct DistVector {
    map: RowPartition,
    values: Vec<f64>,
}

impl DistVector {
    pub fn zeros(map: RowPartition) -> Self {
        let values = vec![0.0; map.local_len()];
        Self { map, values }
    }

    /// Every entry set to `value`.
    pub fn filled(map: RowPartition, value: f64) -> Self {
        let values = vec![value; map.local_len()];
        Self { map, values }
    }

    pub fn from_local(map: RowPartition, values: Vec<f64>) -> Result<Self, KError> {
        if values.len() != map.local_len() {
            return Err(KError::DimensionMismatch(format!(
                "{} local values for a partition owning {}",
                values.len(),
                map.local_len()
            )));
        }
        Ok(Self { map, values })
    }

    /// Takes the owned entries out of a full global vector.
    pub fn from_global(map: RowPartition, global: &[f64]) -> Result<Self, KError> {
        if global.len() != map.global_len() {
            return Err(KError::DimensionMismatch(format!(
                "global vector has {} entries, partition has {}",
                global.len(),
                map.global_len()
            )));
        }
        let values = map.local_slice(global).to_vec();
        Ok(Self { map, values })
    }

    pub fn map(&self) -> &RowPartition {
        &self.map
    }

    pub fn local(&self) -> &[f64] {
        &self.values
    }

    pub fn local_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn into_local(self) -> Vec<f64> {
        self.values
    }

    pub fn fill(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v = value);
    }

    /// Global dot product. Collective.
    pub fn dot(&self, other: &DistVector) -> Result<f64, KError> {
        self.map.ensure_compatible(&other.map, "dot")?;
        Ok(DistributedInnerProduct::new(self.map.comm().as_ref()).dot(&self.values[..], &other.values[..]))
    }

    /// Global 2-norm. Collective.
    pub fn norm2(&self) -> f64 {
        DistributedInnerProduct::new(self.map.comm().as_ref()).norm(&self.values[..])
    }

    /// `self = alpha * x + self`.
    pub fn axpy(&mut self, alpha: f64, x: &DistVector) -> Result<(), KError> {
        self.map.ensure_compatible(&x.map, "axpy")?;
        self.values.iter_mut().zip(&x.values).for_each(|(y, &xi)| *y += alpha * xi);
        Ok(())
    }

    /// Full vector on every rank. Collective.
    pub fn gather(&self) -> Vec<f64> {
        self.map.gather_all(&self.values)
    }
}

/// A set of distributed column vectors sharing one partition (e.g. nodal coordinates).
#[derive(Clone, Debug)]
pub struct MultiVector {
    map: RowPartition,
    columns: Vec<Vec<f64>>,
}

impl MultiVector {
    pub fn zeros(map: RowPartition, num_vectors: usize) -> Self {
        let columns = vec![vec![0.0; map.local_len()]; num_vectors];
        Self { map, columns }
    }

    pub fn from_columns(map: RowPartition, columns: Vec<Vec<f64>>) -> Result<Self, KError> {
        if let Some(c) = columns.iter().find(|c| c.len() != map.local_len()) {
            return Err(KError::DimensionMismatch(format!(
                "column of length {} for a partition owning {}",
                c.len(),
                map.local_len()
            )));
        }
        Ok(Self { map, columns })
    }

    pub fn map(&self) -> &RowPartition {
        &self.map
    }

    pub fn num_vectors(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, j: usize) -> &[f64] {
        &self.columns[j]
    }

    pub fn column_mut(&mut self, j: usize) -> &mut [f64] {
        &mut self.columns[j]
    }

    /// Full columns on every rank. Collective.
    pub fn gather_columns(&self) -> Vec<Vec<f64>> {
        self.columns.iter().map(|c| self.map.gather_all(c)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;
    use std::sync::Arc;

    #[test]
    fn filled_vector_norm() {
        let v = DistVector::filled(RowPartition::serial(4), 1.0);
        assert_eq!(v.norm2(), 2.0);
        assert_eq!(v.dot(&v).unwrap(), 4.0);
    }

    #[test]
    fn axpy_rejects_other_partition() {
        let mut a = DistVector::zeros(RowPartition::serial(3));
        let b = DistVector::filled(RowPartition::serial(4), 1.0);
        assert!(matches!(a.axpy(1.0, &b), Err(KError::IncompatiblePartition(_))));
    }

    #[test]
    fn distributed_norm_and_gather() {
        let global: Vec<f64> = (0..7).map(|i| i as f64).collect();
        let handles: Vec<_> = ThreadComm::group(2)
            .into_iter()
            .map(|comm| {
                let global = global.clone();
                std::thread::spawn(move || {
                    let map = RowPartition::uniform(7, Arc::new(comm));
                    let v = DistVector::from_global(map, &global).unwrap();
                    (v.norm2(), v.gather())
                })
            })
            .collect();
        let expected = global.iter().map(|x| x * x).sum::<f64>().sqrt();
        for h in handles {
            let (n, g) = h.join().unwrap();
            assert!((n - expected).abs() < 1e-12);
            assert_eq!(g, global);
        }
    }
}
