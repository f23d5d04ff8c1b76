//! The Maxwell benchmark end to end: generated problems, MatrixMarket files on disk, and the same
//! run split over thread ranks.

use edgesolve::config::ParameterList;
use edgesolve::driver::maxwell::{self, MaxwellOptions, ProblemSource, TIMER_SOLVE};
use edgesolve::mesh::HexComplex;
use edgesolve::parallel::{Comm, SerialComm, ThreadComm};
use edgesolve::solver::AcceptancePolicy;
use edgesolve::utils::TimeFormat;
use std::sync::Arc;

#[test]
fn reference_setup_converges_within_acceptance() {
    let opts = MaxwellOptions { source: ProblemSource::Generated(5), ..MaxwellOptions::default() };
    let report = maxwell::run(Arc::new(SerialComm), &opts).unwrap();
    assert_eq!(report.num_edges, 3 * 5 * 6 * 6);
    assert_eq!(report.num_nodes, 6 * 6 * 6);
    assert_eq!(report.preconditioner, "refmaxwell");
    assert!(report.accepted, "{}: {:?}", report.message(), report.stats);
    assert!(report.message().starts_with("SUCCESS! CG converged in"));
    assert!(report.relative_error < 1e-2, "error {}", report.relative_error);
}

#[test]
fn tight_acceptance_fails_the_run() {
    let opts = MaxwellOptions {
        source: ProblemSource::Generated(3),
        acceptance: AcceptancePolicy::new(1),
        timings: false,
        ..MaxwellOptions::default()
    };
    let report = maxwell::run(Arc::new(SerialComm), &opts).unwrap();
    assert!(report.stats.converged);
    assert!(!report.accepted);
    assert_eq!(report.message(), "FAILURE! CG did not converge fast enough.");
    assert!(report.timings.is_none());
}

#[test]
fn files_on_disk_match_generated_run() {
    let dir = tempfile::tempdir().unwrap();
    HexComplex::generate(3).unwrap().write_to_dir(dir.path()).unwrap();
    for name in ["S.txt", "M1.txt", "M0.txt", "D0.txt", "coords.txt"] {
        assert!(dir.path().join(name).exists(), "missing {name}");
    }

    let base = MaxwellOptions { time_format: TimeFormat::Yaml, ..MaxwellOptions::default() };
    let from_files = maxwell::run(
        Arc::new(SerialComm),
        &MaxwellOptions { source: ProblemSource::Files(dir.path().to_path_buf()), ..base.clone() },
    )
    .unwrap();
    let generated =
        maxwell::run(Arc::new(SerialComm), &MaxwellOptions { source: ProblemSource::Generated(3), ..base }).unwrap();

    assert_eq!(from_files.num_edges, generated.num_edges);
    assert!(from_files.stats.iterations.abs_diff(generated.stats.iterations) <= 1);
    assert!(from_files.timings.unwrap().contains(TIMER_SOLVE));
}

#[test]
fn missing_files_are_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let opts = MaxwellOptions { source: ProblemSource::Files(dir.path().to_path_buf()), ..MaxwellOptions::default() };
    assert!(maxwell::run(Arc::new(SerialComm), &opts).is_err());
}

#[test]
fn unknown_preconditioner_is_an_error() {
    let mut params = ParameterList::new();
    params.set("preconditioner: type", "multigrid-of-dreams");
    let opts = MaxwellOptions { source: ProblemSource::Generated(2), params, ..MaxwellOptions::default() };
    assert!(maxwell::run(Arc::new(SerialComm), &opts).is_err());
}

#[test]
fn thread_ranks_reproduce_serial_run() {
    let opts = MaxwellOptions { source: ProblemSource::Generated(3), timings: false, ..MaxwellOptions::default() };
    let serial = maxwell::run(Arc::new(SerialComm), &opts).unwrap();

    let handles: Vec<_> = ThreadComm::group(2)
        .into_iter()
        .map(|comm| {
            let opts = opts.clone();
            std::thread::spawn(move || {
                let comm: Arc<dyn Comm> = Arc::new(comm);
                let r = maxwell::run(comm, &opts).unwrap();
                (r.stats.iterations, r.accepted, r.relative_error)
            })
        })
        .collect();
    for h in handles {
        let (iters, accepted, err) = h.join().unwrap();
        assert!(iters.abs_diff(serial.stats.iterations) <= 1, "{iters} vs {}", serial.stats.iterations);
        assert_eq!(accepted, serial.accepted);
        assert!((err - serial.relative_error).abs() < 1e-3);
    }
}
