//! CG on the shifted edge operator of a small hex mesh.
//!
//! These tests check that the solution matches the exact vector of ones, that the preconditioners
//! cut the iteration count relative to plain CG, and that a thread-distributed solve agrees with
//! the serial one.

use approx::assert_abs_diff_eq;
use edgesolve::config::SolverOptions;
use edgesolve::context::KspContext;
use edgesolve::context::pc_context::PC;
use edgesolve::core::traits::LinearOperator;
use edgesolve::driver::{MaxwellSystem, ProblemSource};
use edgesolve::matrix::{CsrMatrix, two_matrix_add};
use edgesolve::mesh::HexComplex;
use edgesolve::parallel::{Comm, RowPartition, SerialComm, ThreadComm};
use edgesolve::preconditioner::{RefMaxwellParams, SmootherParams};
use edgesolve::solver::{CgSolver, LinearSolver, SolverState};
use std::sync::Arc;

fn triplets_of(m: &CsrMatrix) -> Vec<(usize, usize, f64)> {
    (0..m.local_nrows())
        .flat_map(|i| {
            let (cols, vals) = m.row(i);
            cols.iter().zip(vals).map(move |(&j, &v)| (i, j, v)).collect::<Vec<_>>()
        })
        .collect()
}

/// Solves `A x = A · 1` from a zero guess and returns the iteration count and the solution.
fn solve_ones(a: &CsrMatrix, pc: &PC, aux_system: Option<&MaxwellSystem>, tol: f64) -> (usize, Vec<f64>) {
    let n = a.local_nrows();
    let mut b = vec![0.0; n];
    a.apply(&vec![1.0; n], &mut b).unwrap();
    let opts = SolverOptions { tolerance: tol, max_iterations: 1000, ..SolverOptions::default() };
    let mut ksp = KspContext::new(a, opts);
    let aux = aux_system.map(|s| s.aux());
    ksp.set_pc(pc, aux.as_ref()).unwrap();
    let mut x = vec![0.0; n];
    let stats = ksp.solve(&b, &mut x).unwrap();
    assert!(stats.converged, "{} did not converge: {stats:?}", pc.name());
    (stats.iterations, x)
}

#[test]
fn plain_cg_recovers_ones() {
    let mesh = HexComplex::generate(3).unwrap();
    let sm = two_matrix_add(&mesh.s, 1.0, &mesh.m1, 1.0).unwrap();
    let (_, x) = solve_ones(&sm, &PC::None, None, 1e-10);
    for xi in x {
        assert_abs_diff_eq!(xi, 1.0, epsilon = 1e-6);
    }
}

#[test]
fn chebyshev_needs_fewer_iterations_than_plain_cg() {
    let mesh = HexComplex::generate(3).unwrap();
    let sm = two_matrix_add(&mesh.s, 1.0, &mesh.m1, 1.0).unwrap();
    let s = SmootherParams::default();
    let cheb = PC::Chebyshev { degree: s.degree.max(2), ratio: s.ratio, boost: s.boost };
    let (plain, _) = solve_ones(&sm, &PC::None, None, 1e-8);
    let (smoothed, x) = solve_ones(&sm, &cheb, None, 1e-8);
    assert!(smoothed < plain, "chebyshev {smoothed} vs plain {plain}");
    for xi in x {
        assert_abs_diff_eq!(xi, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn refmaxwell_beats_plain_cg() {
    let system = MaxwellSystem::build(Arc::new(SerialComm), &ProblemSource::Generated(4), 1.0).unwrap();
    let (plain, _) = solve_ones(&system.sm, &PC::None, None, 1e-8);
    for params in [
        RefMaxwellParams::default(),
        RefMaxwellParams { mode: edgesolve::preconditioner::RefMaxwellMode::OneTwoOne, ..RefMaxwellParams::default() },
    ] {
        let (iters, x) = solve_ones(&system.sm, &PC::RefMaxwell(params), Some(&system), 1e-8);
        assert!(iters < plain, "refmaxwell {iters} vs plain {plain}");
        for xi in x {
            assert_abs_diff_eq!(xi, 1.0, epsilon = 1e-5);
        }
    }
}

#[test]
fn refmaxwell_without_aux_data_is_rejected() {
    let mesh = HexComplex::generate(2).unwrap();
    let mut ksp = KspContext::new(&mesh.s, SolverOptions::default());
    assert!(ksp.set_pc(&PC::default(), None).is_err());
}

#[test]
fn iteration_limit_from_toml_is_honoured() {
    let opts: SolverOptions = toml::from_str("max_iterations = 3\ntolerance = 1e-12\n").unwrap();
    let mesh = HexComplex::generate(3).unwrap();
    let sm = two_matrix_add(&mesh.s, 1.0, &mesh.m1, 1.0).unwrap();
    let n = sm.local_nrows();
    let mut b = vec![0.0; n];
    sm.apply(&vec![1.0; n], &mut b).unwrap();
    let mut x = vec![0.0; n];
    let mut solver = CgSolver::from_options(&opts);
    let stats = solver.solve(&sm, None, &b, &mut x).unwrap();
    assert!(!stats.converged);
    assert_eq!(stats.state, SolverState::MaxIterReached);
    assert_eq!(stats.iterations, 3);
    assert_eq!(solver.residual_history.len(), 4);
}

#[test]
fn thread_distributed_cg_matches_serial() {
    let mesh = HexComplex::generate(3).unwrap();
    let sm = two_matrix_add(&mesh.s, 1.0, &mesh.m1, 1.0).unwrap();
    let (serial_iters, serial_x) = solve_ones(&sm, &PC::Jacobi, None, 1e-8);
    let n = sm.global_nrows();

    let t = triplets_of(&sm);
    let handles: Vec<_> = ThreadComm::group(2)
        .into_iter()
        .map(|comm| {
            let t = t.clone();
            std::thread::spawn(move || {
                let comm: Arc<dyn Comm> = Arc::new(comm);
                let map = RowPartition::uniform(n, comm);
                let a = CsrMatrix::from_triplets(map.clone(), map.clone(), &t).unwrap();
                let (iters, x) = solve_ones(&a, &PC::Jacobi, None, 1e-8);
                (iters, map.gather_all(&x))
            })
        })
        .collect();
    for h in handles {
        let (iters, x) = h.join().unwrap();
        assert!(iters.abs_diff(serial_iters) <= 1, "distributed {iters} vs serial {serial_iters}");
        for (a, b) in x.iter().zip(&serial_x) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }
}
