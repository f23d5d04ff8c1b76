//! Contiguous row partitions ("maps").
//!
//! A [`RowPartition`] assigns the global indices `0..global_len` to the ranks of a communicator
//! in contiguous blocks: rank `p` owns `offsets[p]..offsets[p + 1]`. Every global index is owned by
//! exactly one rank and the partition never changes after construction.

use super::{Comm, SerialComm};
use crate::error::KError;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

#[derive(Clone)]
pub struct RowPartition {
    global_len: usize,
    offsets: Vec<usize>,
    comm: Arc<dyn Comm>,
}

impl RowPartition {
    /// Uniform contiguous partition: every rank gets `n / p` rows and the first `n % p` ranks
    /// one extra.
    pub fn uniform(global_len: usize, comm: Arc<dyn Comm>) -> Self {
        let size = comm.size().max(1);
        let base = global_len / size;
        let extra = global_len % size;
        let mut offsets = Vec::with_capacity(size + 1);
        offsets.push(0);
        for p in 0..size {
            let len = base + usize::from(p < extra);
            offsets.push(offsets[p] + len);
        }
        Self { global_len, offsets, comm }
    }

    /// Partition where each rank contributes `local_len` rows in rank order. Collective.
    pub fn from_local_len(local_len: usize, comm: Arc<dyn Comm>) -> Self {
        let counts = comm.all_gather_count(local_len);
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        offsets.push(0);
        for (p, c) in counts.iter().enumerate() {
            offsets.push(offsets[p] + c);
        }
        let global_len = *offsets.last().unwrap_or(&0);
        Self { global_len, offsets, comm }
    }

    /// Single-rank partition on a private [`SerialComm`].
    pub fn serial(global_len: usize) -> Self {
        Self {
            global_len,
            offsets: vec![0, global_len],
            comm: Arc::new(SerialComm),
        }
    }

    pub fn global_len(&self) -> usize {
        self.global_len
    }

    pub fn local_len(&self) -> usize {
        let r = self.local_range();
        r.end - r.start
    }

    /// Global indices owned by the calling rank.
    pub fn local_range(&self) -> Range<usize> {
        self.range_of(self.comm.rank())
    }

    pub fn range_of(&self, rank: usize) -> Range<usize> {
        self.offsets[rank]..self.offsets[rank + 1]
    }

    /// Number of rows owned by each rank.
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn owns(&self, global: usize) -> bool {
        self.local_range().contains(&global)
    }

    /// Rank owning `global`, or `None` when the index is out of range.
    pub fn owner_of(&self, global: usize) -> Option<usize> {
        if global >= self.global_len {
            return None;
        }
        // offsets is sorted; the owner is the last rank whose offset is <= global
        let p = self.offsets.partition_point(|&o| o <= global);
        Some(p - 1)
    }

    pub fn comm(&self) -> &Arc<dyn Comm> {
        &self.comm
    }

    pub fn is_distributed(&self) -> bool {
        self.comm.size() > 1
    }

    /// Same global length and the same ownership of every index.
    pub fn is_compatible(&self, other: &RowPartition) -> bool {
        self.global_len == other.global_len && self.offsets == other.offsets
    }

    pub(crate) fn ensure_compatible(&self, other: &RowPartition, what: &str) -> Result<(), KError> {
        if self.is_compatible(other) {
            Ok(())
        } else {
            Err(KError::IncompatiblePartition(format!(
                "{what}: {self:?} vs {other:?}"
            )))
        }
    }

    /// All-gathers a locally owned slice into the full global vector. Collective.
    pub fn gather_all(&self, local: &[f64]) -> Vec<f64> {
        debug_assert_eq!(local.len(), self.local_len());
        if !self.is_distributed() {
            return local.to_vec();
        }
        self.comm.all_gather_varcount(local, &self.counts())
    }

    /// The calling rank's slice of a global vector.
    pub fn local_slice<'a>(&self, global: &'a [f64]) -> &'a [f64] {
        &global[self.local_range()]
    }
}

impl fmt::Debug for RowPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowPartition")
            .field("global_len", &self.global_len)
            .field("offsets", &self.offsets)
            .finish()
    }
}
