// rayon-based shared-memory communicator

use rayon::prelude::*;

/// A single rank whose local kernels run on the global rayon pool.
///
/// Collectives are identities; the data parallelism lives inside the SpMV and inner-product
/// kernels, which use rayon whenever the `rayon` feature is enabled.
pub struct RayonComm {
    threads: usize,
}

impl RayonComm {
    pub fn new() -> Self {
        Self::with_threads(num_cpus::get())
    }

    pub fn with_threads(threads: usize) -> Self {
        // the global pool can only be built once; later calls keep the existing pool
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
        RayonComm { threads: rayon::current_num_threads().max(1) }
    }

    /// Width of the thread pool backing this rank.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Default for RayonComm {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Comm for RayonComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) { rayon::scope(|_| {}); }
    fn all_reduce(&self, x: f64) -> f64 {
        x // No-op for shared memory
    }
    fn all_reduce_max(&self, x: f64) -> f64 { x }
    fn all_reduce_min(&self, x: f64) -> f64 { x }
    fn all_gather_varcount(&self, local: &[f64], _counts: &[usize]) -> Vec<f64> {
        local.to_vec()
    }
    fn all_gather_indices(&self, local: &[usize], _counts: &[usize]) -> Vec<usize> {
        local.to_vec()
    }
    fn all_gather_count(&self, n: usize) -> Vec<usize> {
        vec![n]
    }
    fn dot(&self, a: &[f64], b: &[f64]) -> f64 {
        a.par_iter().zip(b.par_iter()).map(|(&x, &y)| x * y).sum()
    }
}
