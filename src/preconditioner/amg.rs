//! Smoothed-aggregation algebraic multigrid.
//!
//! Setup per level: strength-of-connection graph on (block) nodes, three-phase uncoupled
//! aggregation, piecewise-constant tentative prolongator, one damped-Jacobi smoothing step
//! `P = (I − ω/λ D⁻¹A) P_tent`, `R = Pᵀ`, Galerkin coarse operator `R A P`. The coarsest matrix
//! is factored densely after a small diagonal shift, so singular semidefinite operators are fine.
//!
//! The hierarchy is serial; distributed callers replicate the matrix first and wrap the result in
//! [`crate::preconditioner::Replicated`].

use crate::config::ParameterList;
use crate::error::KError;
use crate::matrix::{CsrMatrix, DenseLu, multiply, transpose, two_matrix_add};
use crate::parallel::RowPartition;
use crate::preconditioner::Preconditioner;
use crate::preconditioner::chebyshev::{POWER_ITERATIONS, estimate_lambda_max};
use crate::preconditioner::jacobi::inverse_diagonal;
use crate::preconditioner::smoother::{Smoother, SmootherParams};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct AmgParams {
    /// Total number of levels, coarsest included.
    pub max_levels: usize,
    /// Stop coarsening once a level has at most this many rows.
    pub max_coarse_size: usize,
    /// Unknowns per node; rows `b·i .. b·i + b` form node `i`.
    pub block_size: usize,
    pub drop_tol: f64,
    pub damping: f64,
    pub smoother: SmootherParams,
    /// Coarse LU shift, relative to the mean absolute diagonal.
    pub coarse_regularization: f64,
}

impl Default for AmgParams {
    fn default() -> Self {
        Self {
            max_levels: 10,
            max_coarse_size: 2000,
            block_size: 1,
            drop_tol: 0.0,
            damping: 4.0 / 3.0,
            smoother: SmootherParams::default(),
            coarse_regularization: 1e-8,
        }
    }
}

impl AmgParams {
    pub fn from_list(list: &ParameterList, defaults: &AmgParams) -> Result<Self, KError> {
        let params = Self {
            max_levels: list.get_usize("max levels", defaults.max_levels)?,
            max_coarse_size: list.get_usize("coarse: max size", defaults.max_coarse_size)?,
            block_size: list.get_usize("number of equations", defaults.block_size)?,
            drop_tol: list.get_f64("aggregation: drop tol", defaults.drop_tol)?,
            damping: list.get_f64("sa: damping factor", defaults.damping)?,
            smoother: SmootherParams::from_list(list, &defaults.smoother)?,
            coarse_regularization: list.get_f64("coarse: regularization", defaults.coarse_regularization)?,
        };
        if params.max_levels == 0 {
            return Err(KError::invalid("max levels", "must be at least 1"));
        }
        if params.block_size == 0 {
            return Err(KError::invalid("number of equations", "must be at least 1"));
        }
        Ok(params)
    }
}

struct Level {
    a: Arc<CsrMatrix>,
    smoother: Smoother,
    p: CsrMatrix,
    r: CsrMatrix,
}

pub struct Amg {
    levels: Vec<Level>,
    coarse: DenseLu,
}

impl Amg {
    pub fn new(a: &CsrMatrix, params: &AmgParams) -> Result<Self, KError> {
        if a.row_partition().is_distributed() {
            return Err(KError::Unsupported("AMG setup on a distributed matrix; replicate it first"));
        }
        if a.global_nrows() != a.global_ncols() {
            return Err(KError::DimensionMismatch(format!(
                "AMG needs a square matrix, got {}x{}",
                a.global_nrows(),
                a.global_ncols()
            )));
        }
        let mut levels = Vec::new();
        let mut current = Arc::new(a.clone());
        while levels.len() + 1 < params.max_levels && current.global_nrows() > params.max_coarse_size {
            let graph = strength_graph(&current, params.block_size, params.drop_tol)?;
            let (aggregates, n_agg) = aggregate(&graph);
            let coarse_n = n_agg * params.block_size;
            if n_agg == 0 || coarse_n >= current.global_nrows() {
                debug!("amg: no further coarsening at level {}", levels.len());
                break;
            }
            let p_tent = tentative_prolongator(&aggregates, n_agg, params.block_size)?;
            let p = smooth_prolongator(&current, &p_tent, params.damping)?;
            let r = transpose(&p)?;
            let coarse = multiply(&r, &multiply(&current, &p)?)?;
            let smoother = Smoother::new(current.clone(), &params.smoother)?;
            info!(
                "amg: level {}: rows = {}, nnz = {} -> {} aggregates",
                levels.len(),
                current.global_nrows(),
                current.nnz(),
                n_agg
            );
            levels.push(Level { a: current, smoother, p, r });
            current = Arc::new(coarse);
        }
        info!(
            "amg: coarsest level {}: rows = {}, nnz = {} (direct solve)",
            levels.len(),
            current.global_nrows(),
            current.nnz()
        );
        let coarse = DenseLu::from_sparse(&current, params.coarse_regularization)?;
        Ok(Self { levels, coarse })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len() + 1
    }

    /// Rows per level, finest first.
    pub fn level_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.levels.iter().map(|l| l.a.global_nrows()).collect();
        sizes.push(self.coarse.dim());
        sizes
    }

    fn vcycle(&self, l: usize, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let Some(level) = self.levels.get(l) else {
            self.coarse.solve(r, z);
            return Ok(());
        };
        let n = r.len();
        let mut res = vec![0.0; n];

        level.smoother.smooth(r, z)?;
        residual(&level.a, r, z, &mut res);

        let nc = level.r.global_nrows();
        let mut rc = vec![0.0; nc];
        let mut zc = vec![0.0; nc];
        level.r.spmv_local(&res, &mut rc);
        self.vcycle(l + 1, &rc, &mut zc)?;
        let mut corr = vec![0.0; n];
        level.p.spmv_local(&zc, &mut corr);
        z.iter_mut().zip(&corr).for_each(|(zi, ci)| *zi += ci);

        residual(&level.a, r, z, &mut res);
        level.smoother.smooth(&res, &mut corr)?;
        z.iter_mut().zip(&corr).for_each(|(zi, ci)| *zi += ci);
        Ok(())
    }
}

impl Preconditioner for Amg {
    fn apply(&self, r: &[f64], z: &mut [f64]) -> Result<(), KError> {
        let n = self.level_sizes()[0];
        if r.len() != n || z.len() != n {
            return Err(KError::DimensionMismatch(format!(
                "amg: hierarchy has {n} rows, got r={} z={}",
                r.len(),
                z.len()
            )));
        }
        self.vcycle(0, r, z)
    }
}

fn residual(a: &CsrMatrix, r: &[f64], z: &[f64], out: &mut [f64]) {
    a.spmv_local(z, out);
    out.iter_mut().zip(r).for_each(|(o, &ri)| *o = ri - *o);
}

/// Strong neighbours of every node (self excluded).
///
/// Node couplings are the Frobenius norms of the `block × block` blocks; `j` is a strong neighbour
/// of `i` when `‖A_ij‖ > drop_tol · sqrt(‖A_ii‖ ‖A_jj‖)`.
pub fn strength_graph(a: &CsrMatrix, block: usize, drop_tol: f64) -> Result<Vec<Vec<usize>>, KError> {
    let n = a.local_nrows();
    if n % block != 0 {
        return Err(KError::DimensionMismatch(format!("{n} rows do not split into blocks of {block}")));
    }
    let nodes = n / block;
    let mut coupling: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); nodes];
    for (i, node) in coupling.iter_mut().enumerate() {
        for row in block * i..block * (i + 1) {
            let (cols, vals) = a.row(row);
            for (&c, &v) in cols.iter().zip(vals) {
                *node.entry(c / block).or_insert(0.0) += v * v;
            }
        }
    }
    let diag: Vec<f64> = coupling
        .iter()
        .enumerate()
        .map(|(i, m)| m.get(&i).copied().unwrap_or(0.0).sqrt())
        .collect();
    Ok(coupling
        .iter()
        .enumerate()
        .map(|(i, m)| {
            m.iter()
                .filter(|&(&j, &sq)| j != i && sq.sqrt() > drop_tol * (diag[i] * diag[j]).sqrt() && sq > 0.0)
                .map(|(&j, _)| j)
                .collect()
        })
        .collect())
}

/// Three-phase uncoupled aggregation. Returns the aggregate of each node and the aggregate count.
///
/// 1. A node whose neighbours are all free becomes a root: it forms an aggregate with them.
/// 2. Free nodes join the neighbouring aggregate they have the most connections to.
/// 3. Remaining nodes form aggregates with their free neighbours (singletons if isolated).
pub fn aggregate(graph: &[Vec<usize>]) -> (Vec<usize>, usize) {
    const FREE: usize = usize::MAX;
    let n = graph.len();
    let mut agg = vec![FREE; n];
    let mut count = 0;

    for i in 0..n {
        if agg[i] == FREE && !graph[i].is_empty() && graph[i].iter().all(|&j| agg[j] == FREE) {
            agg[i] = count;
            for &j in &graph[i] {
                agg[j] = count;
            }
            count += 1;
        }
    }

    for i in 0..n {
        if agg[i] != FREE {
            continue;
        }
        let mut votes: BTreeMap<usize, usize> = BTreeMap::new();
        for &j in &graph[i] {
            if agg[j] != FREE {
                *votes.entry(agg[j]).or_insert(0) += 1;
            }
        }
        // most connections wins; ties go to the lowest aggregate id
        if let Some((&best, _)) = votes.iter().max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0))) {
            agg[i] = best;
        }
    }

    for i in 0..n {
        if agg[i] != FREE {
            continue;
        }
        agg[i] = count;
        for &j in &graph[i] {
            if agg[j] == FREE {
                agg[j] = count;
            }
        }
        count += 1;
    }
    (agg, count)
}

/// `P[b·i + c, b·agg(i) + c] = 1`.
pub fn tentative_prolongator(aggregates: &[usize], n_agg: usize, block: usize) -> Result<CsrMatrix, KError> {
    let n = aggregates.len() * block;
    let row_ptr = (0..=n).collect();
    let col_idx = (0..n).map(|row| block * aggregates[row / block] + row % block).collect();
    CsrMatrix::from_csr(
        RowPartition::serial(n),
        RowPartition::serial(n_agg * block),
        row_ptr,
        col_idx,
        vec![1.0; n],
    )
}

/// `P = P_tent − (ω / λmax) D⁻¹ A P_tent` with `λmax` of `D⁻¹A` from power iteration.
pub fn smooth_prolongator(a: &CsrMatrix, p_tent: &CsrMatrix, damping: f64) -> Result<CsrMatrix, KError> {
    let inv_diag = inverse_diagonal(a);
    let lambda = estimate_lambda_max(a, &inv_diag, POWER_ITERATIONS)?;
    if !(lambda > 0.0) || damping == 0.0 {
        return Ok(p_tent.clone());
    }
    let mut ap = multiply(a, p_tent)?;
    ap.left_scale(&inv_diag);
    two_matrix_add(p_tent, 1.0, &ap, -damping / lambda)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::LinearOperator;

    /// `‖b − A x‖₂` for replicated operands.
    fn residual_norm(a: &CsrMatrix, b: &[f64], x: &[f64]) -> Result<f64, KError> {
        let mut ax = vec![0.0; b.len()];
        a.apply(x, &mut ax)?;
        Ok(b.iter().zip(&ax).map(|(bi, ai)| (bi - ai) * (bi - ai)).sum::<f64>().sqrt())
    }

    fn laplace_2d(m: usize) -> CsrMatrix {
        let n = m * m;
        let mut t = Vec::new();
        for j in 0..m {
            for i in 0..m {
                let row = i + m * j;
                t.push((row, row, 4.0));
                if i > 0 {
                    t.push((row, row - 1, -1.0));
                }
                if i + 1 < m {
                    t.push((row, row + 1, -1.0));
                }
                if j > 0 {
                    t.push((row, row - m, -1.0));
                }
                if j + 1 < m {
                    t.push((row, row + m, -1.0));
                }
            }
        }
        CsrMatrix::from_triplets(RowPartition::serial(n), RowPartition::serial(n), &t).unwrap()
    }

    #[test]
    fn aggregation_covers_every_node() {
        let a = laplace_2d(8);
        let graph = strength_graph(&a, 1, 0.0).unwrap();
        let (agg, count) = aggregate(&graph);
        assert!(agg.iter().all(|&g| g < count));
        assert!(count < 64 / 2, "too little coarsening: {count}");
    }

    #[test]
    fn isolated_nodes_become_singletons() {
        let graph = vec![vec![1], vec![0], vec![]];
        let (agg, count) = aggregate(&graph);
        assert_eq!(agg, vec![0, 0, 1]);
        assert_eq!(count, 2);
    }

    #[test]
    fn block_prolongator_keeps_components_apart() {
        let p = tentative_prolongator(&[0, 0, 1], 2, 3).unwrap();
        assert_eq!(p.global_nrows(), 9);
        assert_eq!(p.global_ncols(), 6);
        assert_eq!(p.get(4, 1), Some(1.0));
        assert_eq!(p.get(8, 5), Some(1.0));
    }

    #[test]
    fn hierarchy_respects_limits() {
        let a = laplace_2d(12);
        let params = AmgParams { max_coarse_size: 10, max_levels: 3, ..AmgParams::default() };
        let amg = Amg::new(&a, &params).unwrap();
        assert!(amg.num_levels() <= 3);
        let sizes = amg.level_sizes();
        assert_eq!(sizes[0], 144);
        assert!(sizes.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn vcycle_is_symmetric_positive_definite() {
        let a = laplace_2d(10);
        let params = AmgParams { max_coarse_size: 8, max_levels: 4, ..AmgParams::default() };
        let amg = Amg::new(&a, &params).unwrap();
        let x: Vec<f64> = (0..100).map(|i| (i as f64 * 0.37).sin()).collect();
        let y: Vec<f64> = (0..100).map(|i| (i as f64 * 0.11).cos()).collect();
        let (mut bx, mut by) = (vec![0.0; 100], vec![0.0; 100]);
        amg.apply(&x, &mut bx).unwrap();
        amg.apply(&y, &mut by).unwrap();
        let ybx: f64 = y.iter().zip(&bx).map(|(a, b)| a * b).sum();
        let xby: f64 = x.iter().zip(&by).map(|(a, b)| a * b).sum();
        assert!((ybx - xby).abs() < 1e-8 * ybx.abs().max(1.0));
        assert!(x.iter().zip(&bx).map(|(a, b)| a * b).sum::<f64>() > 0.0);
    }

    #[test]
    fn vcycle_reduces_error() {
        let a = laplace_2d(10);
        let params = AmgParams { max_coarse_size: 8, ..AmgParams::default() };
        let amg = Amg::new(&a, &params).unwrap();
        let b = vec![1.0; 100];
        let mut x = vec![0.0; 100];
        amg.apply(&b, &mut x).unwrap();
        assert!(residual_norm(&a, &b, &x).unwrap() < 0.5 * 10.0);
    }
}
