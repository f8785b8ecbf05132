//! Benchmarks for the volume and surface RHS kernels.
//!
//! Run with: `cargo bench --bench surface_bench`
//!
//! Measures both kernels on uniform meshes at several polynomial degrees,
//! in 2D acoustics and the six-field BGK system.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use mrab_dg::mesh::{LevelConfig, MeshTopology, MrabLevels, RectangleMesh};
use mrab_dg::operators::ReferenceTables;
use mrab_dg::parallel::SerialHalo;
use mrab_dg::physics::{Acoustics, BoltzmannBgk2D, WavePhysics};
use mrab_dg::solver::{KernelContext, SolverState, project_only, surface_rhs, volume_rhs};
use mrab_dg::types::{Dimension, LevelIndex};

#[cfg(feature = "parallel")]
use mrab_dg::solver::{surface_rhs_parallel, volume_rhs_parallel};

/// Setup a square mesh with a smooth state and current traces.
fn setup_problem(
    nx: usize,
    order: usize,
    physics: &dyn WavePhysics,
) -> (ReferenceTables, MeshTopology, MrabLevels) {
    let tables = ReferenceTables::new(Dimension::Two, order).unwrap();
    let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, nx, nx).build().unwrap();
    let n_total = mesh.n_total();
    let topo = MeshTopology::new(mesh, vec![order; n_total], &tables).unwrap();
    let levels = MrabLevels::build(
        topo.mesh(),
        &vec![1e-3; topo.n_elements()],
        &LevelConfig::default(),
        &mut SerialHalo,
    )
    .unwrap();
    assert_eq!(physics.dim(), Dimension::Two);
    (tables, topo, levels)
}

fn initial_state(ctx: &KernelContext, levels: &MrabLevels) -> SolverState {
    let nf = ctx.physics.n_fields();
    let mut state = SolverState::new(ctx.topo, nf, 1, None);
    for (i, v) in state.q_mut().iter_mut().enumerate() {
        *v = 1.0 + 0.1 * (0.37 * i as f64).sin();
    }
    project_only(ctx, &mut state, levels.elements(LevelIndex::ZERO), LevelIndex::ZERO, [0.0; 3], 0.0, 1e-3);
    state
}

/// Volume and surface kernels at different degrees.
fn bench_kernels_degree(c: &mut Criterion) {
    let mut group = c.benchmark_group("acoustics_kernels");
    group.sample_size(50);

    let physics = Acoustics::two_d();
    for order in [1, 3, 5, 7] {
        let (tables, topo, levels) = setup_problem(16, order, &physics);
        let ctx = KernelContext::new(&topo, &tables, &physics, 0.5);
        let elems = levels.elements(LevelIndex::ZERO);
        let mut state = initial_state(&ctx, &levels);

        group.bench_with_input(BenchmarkId::new("volume", order), &order, |b, _| {
            b.iter(|| volume_rhs(black_box(&ctx), &mut state, elems, 0));
        });
        group.bench_with_input(BenchmarkId::new("surface", order), &order, |b, _| {
            b.iter(|| surface_rhs(black_box(&ctx), &mut state, elems, 0, black_box(0.0)));
        });

        #[cfg(feature = "parallel")]
        {
            group.bench_with_input(BenchmarkId::new("volume_parallel", order), &order, |b, _| {
                b.iter(|| volume_rhs_parallel(black_box(&ctx), &mut state, elems, 0));
            });
            group.bench_with_input(BenchmarkId::new("surface_parallel", order), &order, |b, _| {
                b.iter(|| surface_rhs_parallel(black_box(&ctx), &mut state, elems, 0, black_box(0.0)));
            });
        }
    }

    group.finish();
}

/// Six-field BGK system, where the flux and relaxation dominate.
fn bench_bgk_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("bgk_kernels");
    group.sample_size(30);

    let physics = BoltzmannBgk2D::default();
    for nx in [8, 16, 32] {
        let (tables, topo, levels) = setup_problem(nx, 3, &physics);
        let ctx = KernelContext::new(&topo, &tables, &physics, 0.5);
        let elems = levels.elements(LevelIndex::ZERO);
        let mut state = initial_state(&ctx, &levels);
        let n_elements = topo.n_elements();

        group.bench_with_input(BenchmarkId::new("rhs", n_elements), &n_elements, |b, _| {
            b.iter(|| {
                volume_rhs(black_box(&ctx), &mut state, elems, 0);
                surface_rhs(black_box(&ctx), &mut state, elems, 0, black_box(0.0));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_kernels_degree, bench_bgk_kernels);
criterion_main!(benches);
