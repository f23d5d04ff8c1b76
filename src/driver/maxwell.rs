//! The Maxwell benchmark: read (or generate) the edge-element operators, build the shifted system
//! `SM = S + scaling · M1` and its preconditioner, solve `SM x = SM · 1` with CG and judge the
//! iteration count.

use crate::config::{ParameterList, SolverOptions};
use crate::context::KspContext;
use crate::context::pc_context::{AuxiliaryData, PC};
use crate::core::traits::LinearOperator;
use crate::error::KError;
use crate::io::{read_header, read_matrix, read_multivector};
use crate::matrix::{CsrMatrix, MultiVector, lumped_inverse, two_matrix_add};
use crate::mesh::HexComplex;
use crate::parallel::{Comm, RowPartition};
use crate::solver::AcceptancePolicy;
use crate::utils::convergence::SolveStats;
use crate::utils::timing::{TimeFormat, TimeMonitor};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub const TIMER_GLOBAL: &str = "Maxwell: S - Global Time";
pub const TIMER_READ: &str = "Maxwell: 1 - Read and Build Matrices";
pub const TIMER_PRECONDITIONER: &str = "Maxwell: 2 - Build Preconditioner";
pub const TIMER_RHS: &str = "Maxwell: 3 - Setup RHS etc";
pub const TIMER_SOLVE: &str = "Maxwell: 4 - Solve";

/// Where the operators come from.
#[derive(Clone, Debug, PartialEq)]
pub enum ProblemSource {
    /// A directory holding `S.txt`, `M1.txt`, `M0.txt`, `D0.txt` and `coords.txt`.
    Files(PathBuf),
    /// The hex complex with this many cells per direction, built in memory.
    Generated(usize),
}

#[derive(Clone, Debug)]
pub struct MaxwellOptions {
    pub source: ProblemSource,
    /// Mass-term scaling in `S + scaling · M1`.
    pub scaling: f64,
    pub params: ParameterList,
    pub solver: SolverOptions,
    pub acceptance: AcceptancePolicy,
    pub timings: bool,
    pub time_format: TimeFormat,
}

impl Default for MaxwellOptions {
    fn default() -> Self {
        Self {
            source: ProblemSource::Files(PathBuf::from(".")),
            scaling: 1.0,
            params: default_params(),
            solver: SolverOptions::default(),
            acceptance: AcceptancePolicy::default(),
            timings: true,
            time_format: TimeFormat::TableFixed,
        }
    }
}

/// The preconditioner list of the reference run: RefMaxwell, 4 levels, coarse size 25,
/// Chebyshev smoothing and empty 11/22 sublists.
pub fn default_params() -> ParameterList {
    let mut list = ParameterList::new();
    list.set("preconditioner: type", "refmaxwell")
        .set("refmaxwell: disable addon", false)
        .set("refmaxwell: max coarse size", 25usize)
        .set("refmaxwell: max levels", 4usize)
        .set("smoother: type", "CHEBYSHEV")
        .set("refmaxwell: 11 list", ParameterList::new())
        .set("refmaxwell: 22 list", ParameterList::new());
    list
}

/// Outcome of one run.
#[derive(Clone, Debug)]
pub struct MaxwellReport {
    pub num_edges: usize,
    pub num_nodes: usize,
    pub preconditioner: &'static str,
    pub stats: SolveStats<f64>,
    pub accepted: bool,
    /// `‖x − 1‖ / ‖1‖` of the computed solution.
    pub relative_error: f64,
    /// Timing report, if requested.
    pub timings: Option<String>,
}

impl MaxwellReport {
    pub fn message(&self) -> String {
        if self.accepted {
            format!("SUCCESS! CG converged in {} iterations.", self.stats.iterations)
        } else {
            "FAILURE! CG did not converge fast enough.".to_string()
        }
    }
}

/// Operators of one problem, distributed over the run's partitions.
pub struct MaxwellSystem {
    pub edge_map: RowPartition,
    pub node_map: RowPartition,
    /// `S + scaling · M1`.
    pub sm: CsrMatrix,
    pub d0: CsrMatrix,
    pub m0inv: CsrMatrix,
    pub m1: CsrMatrix,
    pub coords: MultiVector,
}

impl MaxwellSystem {
    /// Reads or generates the operators and forms `SM` and `M0inv`. Collective.
    pub fn build(comm: Arc<dyn Comm>, source: &ProblemSource, scaling: f64) -> Result<Self, KError> {
        let (s, m1, m0, d0, coords) = match source {
            ProblemSource::Files(dir) => {
                let ne = read_header(&dir.join("S.txt"))?.rows;
                let nn = read_header(&dir.join("D0.txt"))?.cols;
                let edge_map = RowPartition::uniform(ne, comm.clone());
                let node_map = RowPartition::uniform(nn, comm);
                (
                    read_matrix(&dir.join("S.txt"), edge_map.clone(), edge_map.clone())?,
                    read_matrix(&dir.join("M1.txt"), edge_map.clone(), edge_map.clone())?,
                    read_matrix(&dir.join("M0.txt"), node_map.clone(), node_map.clone())?,
                    read_matrix(&dir.join("D0.txt"), edge_map, node_map.clone())?,
                    read_multivector(&dir.join("coords.txt"), node_map)?,
                )
            }
            ProblemSource::Generated(n) => {
                let mesh = HexComplex::generate(*n)?;
                let edge_map = RowPartition::uniform(mesh.num_edges(), comm.clone());
                let node_map = RowPartition::uniform(mesh.num_nodes(), comm);
                let columns = mesh
                    .coords
                    .iter()
                    .map(|c| node_map.local_slice(c).to_vec())
                    .collect();
                (
                    mesh.s.distribute(edge_map.clone(), edge_map.clone())?,
                    mesh.m1.distribute(edge_map.clone(), edge_map.clone())?,
                    mesh.m0.distribute(node_map.clone(), node_map.clone())?,
                    mesh.d0.distribute(edge_map, node_map.clone())?,
                    MultiVector::from_columns(node_map, columns)?,
                )
            }
        };
        let m0inv = lumped_inverse(&m0)?;
        let sm = two_matrix_add(&s, 1.0, &m1, scaling)?;
        Ok(Self {
            edge_map: sm.row_partition().clone(),
            node_map: m0inv.row_partition().clone(),
            sm,
            d0,
            m0inv,
            m1,
            coords,
        })
    }

    pub fn aux(&self) -> AuxiliaryData<'_> {
        AuxiliaryData {
            d0: &self.d0,
            m0inv: &self.m0inv,
            m1: &self.m1,
            coords: &self.coords,
        }
    }
}

fn timed<R>(
    monitor: &mut TimeMonitor,
    comm: &dyn Comm,
    name: &str,
    f: impl FnOnce() -> Result<R, KError>,
) -> Result<R, KError> {
    comm.barrier();
    monitor.time(name, f)
}

/// Runs the four phases. Collective: every rank calls `run` with the same options.
pub fn run(comm: Arc<dyn Comm>, opts: &MaxwellOptions) -> Result<MaxwellReport, KError> {
    let root = comm.rank() == 0;
    let mut monitor = TimeMonitor::new();
    comm.barrier();
    let global = Instant::now();

    let system = timed(&mut monitor, &*comm, TIMER_READ, || {
        MaxwellSystem::build(comm.clone(), &opts.source, opts.scaling)
    })?;
    if root {
        info!(
            "{} edges, {} nodes, nnz(SM) = {}, scaling = {}",
            system.edge_map.global_len(),
            system.node_map.global_len(),
            system.sm.global_nnz(),
            opts.scaling
        );
    }

    let pc = PC::from_params(&opts.params)?;
    let built = timed(&mut monitor, &*comm, TIMER_PRECONDITIONER, || {
        pc.build(&system.sm, Some(&system.aux()))
    })?;

    let (b, mut x) = timed(&mut monitor, &*comm, TIMER_RHS, || {
        let x_true = vec![1.0; system.edge_map.local_len()];
        let mut b = vec![0.0; x_true.len()];
        system.sm.apply(&x_true, &mut b)?;
        Ok((b, vec![0.0; x_true.len()]))
    })?;

    let mut ksp = KspContext::new(&system.sm, opts.solver.clone()).with_pc(built);
    let stats = timed(&mut monitor, &*comm, TIMER_SOLVE, || ksp.solve(&b, &mut x))?;
    monitor.add(TIMER_GLOBAL, global.elapsed());

    let local_err: f64 = x.iter().map(|v| (v - 1.0) * (v - 1.0)).sum();
    let relative_error = (comm.all_reduce(local_err) / system.edge_map.global_len() as f64).sqrt();
    let accepted = opts.acceptance.accepts(&stats);
    if root {
        info!(
            "CG: {:?} after {} iterations, |r|/|r0| = {:.3e}, |x - 1|/|1| = {relative_error:.3e}",
            stats.state,
            stats.iterations,
            if stats.initial_residual > 0.0 { stats.final_residual / stats.initial_residual } else { 0.0 }
        );
    }
    let timings = opts.timings.then(|| monitor.report(&*comm, opts.time_format));

    Ok(MaxwellReport {
        num_edges: system.edge_map.global_len(),
        num_nodes: system.node_map.global_len(),
        preconditioner: pc.name(),
        stats,
        accepted,
        relative_error,
        timings,
    })
}
