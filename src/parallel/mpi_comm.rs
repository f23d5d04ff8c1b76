//! MPI-based parallel communication module.
//!
//! This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
//! backend for distributed-memory parallelism. Every rank owns a contiguous block of rows; the
//! collectives below are the only points where ranks exchange data. The implementation is only
//! available when the `mpi` feature is enabled.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")]
//! # {
//! use edgesolve::parallel::{Comm, MpiComm};
//! let comm = MpiComm::new().expect("MPI already initialized");
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier();
//! # }
//! ```

use mpi::collective::SystemOperation;
use mpi::datatype::PartitionMut;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

/// MPI communicator wrapper for distributed parallelism.
///
/// Holds the MPI universe (MPI is finalized when it drops), the world communicator, the rank of
/// the current process, and the total number of processes.
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
    _universe: Universe,
}

impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// Returns `None` if MPI was already initialized.
    pub fn new() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Some(MpiComm { world, rank, size, _universe: universe })
    }

    fn reduce_with(&self, x: f64, op: SystemOperation) -> f64 {
        let mut y = x;
        self.world.all_reduce_into(&x, &mut y, op);
        y
    }

    fn layout(counts: &[usize]) -> (Vec<Count>, Vec<Count>) {
        let counts: Vec<Count> = counts.iter().map(|&c| c as Count).collect();
        let displs: Vec<Count> = counts
            .iter()
            .scan(0, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect();
        (counts, displs)
    }
}

impl super::Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize { self.rank }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize { self.size }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) { self.world.barrier(); }

    /// Performs an all-reduce sum operation across all processes.
    fn all_reduce(&self, x: f64) -> f64 {
        self.reduce_with(x, SystemOperation::sum())
    }
    fn all_reduce_max(&self, x: f64) -> f64 {
        self.reduce_with(x, SystemOperation::max())
    }
    fn all_reduce_min(&self, x: f64) -> f64 {
        self.reduce_with(x, SystemOperation::min())
    }

    /// Gathers variable-length slices from all processes onto every process.
    fn all_gather_varcount(&self, local: &[f64], counts: &[usize]) -> Vec<f64> {
        let total: usize = counts.iter().sum();
        let mut out = vec![0.0f64; total];
        let (counts, displs) = Self::layout(counts);
        {
            let mut partition = PartitionMut::new(&mut out[..], counts, &displs[..]);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        out
    }

    fn all_gather_indices(&self, local: &[usize], counts: &[usize]) -> Vec<usize> {
        let send: Vec<u64> = local.iter().map(|&i| i as u64).collect();
        let total: usize = counts.iter().sum();
        let mut out = vec![0u64; total];
        let (counts, displs) = Self::layout(counts);
        {
            let mut partition = PartitionMut::new(&mut out[..], counts, &displs[..]);
            self.world.all_gather_varcount_into(&send[..], &mut partition);
        }
        out.into_iter().map(|i| i as usize).collect()
    }

    fn all_gather_count(&self, n: usize) -> Vec<usize> {
        let send = n as u64;
        let mut out = vec![0u64; self.size];
        self.world.all_gather_into(&send, &mut out[..]);
        out.into_iter().map(|i| i as usize).collect()
    }
}
