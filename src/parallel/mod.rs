//! Communicators and row partitions.
//!
//! Every distributed object in the crate (partitions, matrices, vectors, solvers) reaches the other
//! ranks only through the collective calls of the [`Comm`] trait. A collective returns once every
//! rank of the communicator has entered it, so all ranks progress in lockstep.

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);
    /// Sum of `x` over all ranks.
    fn all_reduce(&self, x: f64) -> f64;
    fn all_reduce_max(&self, x: f64) -> f64;
    fn all_reduce_min(&self, x: f64) -> f64;
    /// Concatenates every rank's `local` slice in rank order. `counts[p]` is the length
    /// contributed by rank `p`.
    fn all_gather_varcount(&self, local: &[f64], counts: &[usize]) -> Vec<f64>;
    /// Index variant of [`Comm::all_gather_varcount`].
    fn all_gather_indices(&self, local: &[usize], counts: &[usize]) -> Vec<usize>;
    /// Gathers one count from every rank.
    fn all_gather_count(&self, n: usize) -> Vec<usize>;
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        let local = a.iter().zip(b).map(|(&x, &y)| x * y).sum::<f64>();
        self.all_reduce(local)
    }
}

pub mod partition;
pub use partition::RowPartition;

pub mod serial_comm;
pub use serial_comm::SerialComm;

pub mod thread_comm;
pub use thread_comm::ThreadComm;

#[cfg(feature="mpi")]
pub mod mpi_comm;
#[cfg(feature="mpi")]
pub use mpi_comm::MpiComm;

#[cfg(feature="rayon")]
pub mod rayon_comm;
#[cfg(feature="rayon")]
pub use rayon_comm::RayonComm;

/// The communicator a program runs on, chosen from the enabled features.
pub enum UniverseComm {
    #[cfg(feature="mpi")]
    Mpi(MpiComm),
    #[cfg(feature="rayon")]
    Rayon(RayonComm),
    Serial(SerialComm),
}

impl UniverseComm {
    /// MPI world when the `mpi` feature is on, otherwise a single shared-memory rank.
    #[allow(unreachable_code)]
    pub fn world() -> Self {
        #[cfg(feature="mpi")]
        {
            if let Some(comm) = MpiComm::new() {
                return UniverseComm::Mpi(comm);
            }
        }
        #[cfg(feature="rayon")]
        {
            return UniverseComm::Rayon(RayonComm::new());
        }
        UniverseComm::Serial(SerialComm)
    }

    fn inner(&self) -> &dyn Comm {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm,
            #[cfg(feature="rayon")]
            UniverseComm::Rayon(comm) => comm,
            UniverseComm::Serial(comm) => comm,
        }
    }
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        self.inner().rank()
    }
    fn size(&self) -> usize {
        self.inner().size()
    }
    fn barrier(&self) {
        self.inner().barrier()
    }
    fn all_reduce(&self, x: f64) -> f64 {
        self.inner().all_reduce(x)
    }
    fn all_reduce_max(&self, x: f64) -> f64 {
        self.inner().all_reduce_max(x)
    }
    fn all_reduce_min(&self, x: f64) -> f64 {
        self.inner().all_reduce_min(x)
    }
    fn all_gather_varcount(&self, local: &[f64], counts: &[usize]) -> Vec<f64> {
        self.inner().all_gather_varcount(local, counts)
    }
    fn all_gather_indices(&self, local: &[usize], counts: &[usize]) -> Vec<usize> {
        self.inner().all_gather_indices(local, counts)
    }
    fn all_gather_count(&self, n: usize) -> Vec<usize> {
        self.inner().all_gather_count(n)
    }
}
