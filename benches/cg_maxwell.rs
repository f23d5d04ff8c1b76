use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use edgesolve::context::pc_context::PC;
use edgesolve::driver::{MaxwellSystem, ProblemSource};
use edgesolve::parallel::SerialComm;
use edgesolve::preconditioner::Preconditioner;
use edgesolve::solver::{CgSolver, LinearSolver};
use edgesolve::core::traits::LinearOperator;
use std::sync::Arc;

fn bench_cg_maxwell(c: &mut Criterion) {
    let mut group = c.benchmark_group("maxwell cg");
    group.sample_size(10);
    let system = MaxwellSystem::build(Arc::new(SerialComm), &ProblemSource::Generated(6), 1.0).unwrap();
    let n = system.sm.local_nrows();
    let mut b = vec![0.0; n];
    system.sm.apply(&vec![1.0; n], &mut b).unwrap();

    for pc in [PC::None, PC::Jacobi, PC::default()] {
        let built = pc.build(&system.sm, Some(&system.aux())).unwrap();
        group.bench_with_input(BenchmarkId::new("solve", pc.name()), &built, |ben, built| {
            ben.iter(|| {
                let mut x = vec![0.0; n];
                let mut solver = CgSolver::new(1e-8, 500);
                let pc: &dyn Preconditioner = built.as_ref();
                let _stats = solver.solve(&system.sm, Some(pc), black_box(&b), black_box(&mut x)).unwrap();
            })
        });
    }

    group.bench_function("refmaxwell setup", |ben| {
        ben.iter(|| PC::default().build(black_box(&system.sm), Some(&system.aux())).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_cg_maxwell);
criterion_main!(benches);
