// single-rank communicator

use super::Comm;

/// One rank; every collective is the identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialComm;

impl Comm for SerialComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) {}
    fn all_reduce(&self, x: f64) -> f64 { x }
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
}
