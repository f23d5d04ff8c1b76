//! In-process communicator: a group of ranks running on OS threads.
//!
//! Each collective is a rendezvous: every rank publishes its contribution into its slot, waits on a
//! barrier, reads all slots, and waits again before the slots may be reused. Reductions combine the
//! contributions in rank order, so results are bitwise identical on every rank and from run to run.
//!
//! # Example
//! ```
//! use edgesolve::parallel::{Comm, ThreadComm};
//! let handles: Vec<_> = ThreadComm::group(2)
//!     .into_iter()
//!     .map(|comm| std::thread::spawn(move || comm.all_reduce(comm.rank() as f64 + 1.0)))
//!     .collect();
//! for h in handles {
//!     assert_eq!(h.join().unwrap(), 3.0);
//! }
//! ```

use super::Comm;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

struct Shared {
    size: usize,
    barrier: Barrier,
    values: Mutex<Vec<Vec<f64>>>,
    indices: Mutex<Vec<Vec<usize>>>,
}

/// One rank of an in-process group. Move each member into its own thread.
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Creates the `size` members of a new group, ordered by rank.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            values: Mutex::new(vec![Vec::new(); size]),
            indices: Mutex::new(vec![Vec::new(); size]),
        });
        (0..size)
            .map(|rank| ThreadComm { rank, shared: Arc::clone(&shared) })
            .collect()
    }

    fn exchange<T: Clone>(&self, slots: &Mutex<Vec<Vec<T>>>, local: &[T]) -> Vec<Vec<T>> {
        lock(slots)[self.rank] = local.to_vec();
        self.shared.barrier.wait();
        let all = lock(slots).clone();
        self.shared.barrier.wait();
        all
    }

    fn exchange_values(&self, local: &[f64]) -> Vec<Vec<f64>> {
        self.exchange(&self.shared.values, local)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.shared.size
    }
    fn barrier(&self) {
        self.shared.barrier.wait();
    }
    fn all_reduce(&self, x: f64) -> f64 {
        self.exchange_values(&[x]).iter().map(|v| v[0]).sum()
    }
    fn all_reduce_max(&self, x: f64) -> f64 {
        self.exchange_values(&[x])
            .iter()
            .map(|v| v[0])
            .fold(f64::NEG_INFINITY, f64::max)
    }
    fn all_reduce_min(&self, x: f64) -> f64 {
        self.exchange_values(&[x])
            .iter()
            .map(|v| v[0])
            .fold(f64::INFINITY, f64::min)
    }
    fn all_gather_varcount(&self, local: &[f64], counts: &[usize]) -> Vec<f64> {
        debug_assert_eq!(counts.get(self.rank).copied(), Some(local.len()));
        self.exchange_values(local).concat()
    }
    fn all_gather_indices(&self, local: &[usize], counts: &[usize]) -> Vec<usize> {
        debug_assert_eq!(counts.get(self.rank).copied(), Some(local.len()));
        self.exchange(&self.shared.indices, local).concat()
    }
    fn all_gather_count(&self, n: usize) -> Vec<usize> {
        self.exchange(&self.shared.indices, &[n]).concat()
    }
}
