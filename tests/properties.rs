//! Cross-module properties of the history, trace and source machinery.

use approx::assert_relative_eq;
use mrab_dg::mesh::{
    BoundaryCode, BoxMesh, LevelConfig, MeshTopology, MrabLevels, RectangleMesh,
};
use mrab_dg::operators::ReferenceTables;
use mrab_dg::parallel::SerialHalo;
use mrab_dg::physics::{Acoustics, BoltzmannBgk2D, WavePhysics};
use mrab_dg::solver::SolverConfig;
use mrab_dg::source::{PointSource, SourcePatch};
use mrab_dg::time::{AdamsBashforth, MrabIntegrator, ShiftRing};
use mrab_dg::types::{Dimension, ElementIndex, LevelIndex};

fn single_level<'a>(
    topo: &'a MeshTopology,
    tables: &'a ReferenceTables,
    physics: &'a dyn WavePhysics,
    dt: f64,
) -> MrabIntegrator<'a> {
    let levels = MrabLevels::build(
        topo.mesh(),
        &vec![dt; topo.n_elements()],
        &LevelConfig::default(),
        &mut SerialHalo,
    )
    .unwrap();
    MrabIntegrator::new(
        topo,
        tables,
        physics,
        levels,
        SolverConfig::default(),
        None,
        &SerialHalo,
    )
    .unwrap()
}

#[test]
fn test_ab3_on_shifted_history_is_exact_for_quadratic_rhs() {
    // q' = 1 + 2t + 3t², q = t + t² + t³
    let f = |t: f64| 1.0 + 2.0 * t + 3.0 * t * t;
    let exact = |t: f64| t + t * t + t * t * t;
    let h = 0.1;
    let ab = AdamsBashforth::new(3).unwrap();

    let mut ring = ShiftRing::new();
    let mut storage = [0.0; 3];
    for (k, t) in [-2.0 * h, -h].into_iter().enumerate() {
        storage[ring.current()] = f(t);
        ring.advance();
        assert_eq!(ring.shift(), k + 1);
    }

    let mut t = 0.0;
    let mut q = exact(t);
    for _ in 0..6 {
        storage[ring.current()] = f(t);
        let w = ab.full_step();
        q += h * (0..3).map(|k| w[k] * storage[ring.slot(k)]).sum::<f64>();
        ring.advance();
        t += h;
        assert_relative_eq!(q, exact(t), epsilon = 1e-12);

        // intermediate state from the rotated history
        let tau = 0.25;
        let w = ab.rewind(tau);
        let back = q + h * (0..3).map(|k| w[k] * storage[ring.slot(k)]).sum::<f64>();
        assert_relative_eq!(back, exact(t - h + tau * h), epsilon = 1e-12);
    }
}

#[test]
fn test_source_interface_adds_incident_with_opposite_signs() {
    let tables = ReferenceTables::new(Dimension::Two, 1).unwrap();
    let mut mesh = RectangleMesh::new(0.5, 1.5, 0.5, 1.5, 2, 2).build().unwrap();
    let e = ElementIndex::new(0);
    let f = (0..3).find(|&f| mesh.neighbor(e, f).is_some()).unwrap();
    let ep = mesh.neighbor(e, f).unwrap();
    let fp = mesh.neighbor_face(e, f);
    mesh.set_boundary(e, f, BoundaryCode::SourceInterior);
    mesh.set_boundary(ep, fp, BoundaryCode::SourceExterior);
    let n_total = mesh.n_total();
    let topo = MeshTopology::new(mesh, vec![1; n_total], &tables).unwrap();

    let physics = Acoustics::two_d();
    let fields = physics.source_fields().unwrap();
    let source = PointSource::new([0.0; 3], 1.0, 0.0);
    let patch = SourcePatch::from_parts(source, vec![e]);
    let mut mrab = single_level(&topo, &tables, &physics, 0.01)
        .with_source(patch)
        .unwrap();
    let t = 1.0;
    mrab.set_initial(t, |_, q| q.fill(0.0));

    let state = mrab.state();
    let nf = physics.n_fields();
    let n_faces = topo.n_faces();
    let jump = |e: ElementIndex, f: usize, n: usize, fld: usize| {
        let idx = state.trace_index(e, f, n, fld);
        state.fqp()[idx] - state.fqm()[idx]
    };

    let mut incident = vec![0.0; nf];
    for n in 0..topo.nfp(e) {
        // at N = 1 the trace coefficients are the vertex values
        source.incident(&topo.face_node(e, f, n), t, &fields, &mut incident);
        let id_p = topo.map_p(e, f, n).unwrap();
        let m = id_p % topo.nfp_max();
        assert_eq!(id_p / topo.nfp_max(), ep.get() * n_faces + fp);
        for fld in 0..nf {
            assert_relative_eq!(jump(e, f, n, fld), incident[fld], epsilon = 1e-12);
            assert_relative_eq!(jump(ep, fp, m, fld), -incident[fld], epsilon = 1e-12);
        }
        assert!(incident[fields.pressure].abs() > 1e-6);
    }

    // faces off the patch interface carry the plain trace
    for g in (0..n_faces).filter(|&g| g != f) {
        for n in 0..topo.nfp(e) {
            for fld in 0..nf {
                assert_eq!(jump(e, g, n, fld), 0.0);
            }
        }
    }
}

#[test]
fn test_shift_rotates_once_per_full_update() {
    let tables = ReferenceTables::new(Dimension::Two, 1).unwrap();
    let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 2, 2).build().unwrap();
    let n_total = mesh.n_total();
    let topo = MeshTopology::new(mesh, vec![1; n_total], &tables).unwrap();
    let physics = Acoustics::two_d();
    let mut mrab = single_level(&topo, &tables, &physics, 0.01);
    mrab.set_initial(0.0, |_, q| q.fill(0.0));

    let lev = LevelIndex::ZERO;
    let start = mrab.state().shift(lev);
    let weights = AdamsBashforth::startup(0).full_step();
    mrab.advance_and_project(lev, weights, 0.01, 0.01);
    assert_eq!(mrab.state().shift(lev).shift(), (start.shift() + 1) % 3);

    // intermediate projections leave the ring alone
    mrab.project_only(lev, AdamsBashforth::startup(0).rewind(0.5), 0.005, 0.01);
    assert_eq!(mrab.state().shift(lev).shift(), (start.shift() + 1) % 3);

    mrab.advance_and_project(lev, weights, 0.02, 0.01);
    mrab.advance_and_project(lev, weights, 0.03, 0.01);
    assert_eq!(mrab.state().shift(lev), start);
}

#[test]
fn test_bgk_rest_state_is_steady() {
    let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
    let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 3, 3).build().unwrap();
    let n_total = mesh.n_total();
    let topo = MeshTopology::new(mesh, vec![2; n_total], &tables).unwrap();
    let physics = BoltzmannBgk2D::default();
    let mut mrab = single_level(&topo, &tables, &physics, 0.005);
    mrab.set_initial(0.0, |_, q| {
        q.fill(0.0);
        q[0] = 1.0;
    });

    let mut halo = SerialHalo;
    for _ in 0..10 {
        mrab.step(&mut halo);
    }
    for e in ElementIndex::iter(topo.n_elements()) {
        for i in 0..topo.np(e) {
            assert_relative_eq!(mrab.state().value(e, i, 0), 1.0, epsilon = 1e-12);
            for fld in 1..6 {
                assert!(mrab.state().value(e, i, fld).abs() < 1e-12);
            }
        }
    }
}

#[test]
fn test_uniform_pressure_survives_mixed_degrees() {
    // alternating degrees, so raise and lower both act on shared faces
    let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
    let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 3, 3).build().unwrap();
    let degrees: Vec<usize> = (0..mesh.n_total()).map(|e| 1 + e % 2).collect();
    let topo = MeshTopology::new(mesh, degrees, &tables).unwrap();
    let physics = Acoustics::two_d();
    let mut mrab = single_level(&topo, &tables, &physics, 0.005);
    mrab.set_initial(0.0, |_, q| {
        q.fill(0.0);
        q[2] = 2.0;
    });

    mrab.run(0.05, &mut SerialHalo).unwrap();
    for e in ElementIndex::iter(topo.n_elements()) {
        for i in 0..topo.np(e) {
            assert_relative_eq!(mrab.state().value(e, i, 2), 2.0, epsilon = 1e-11);
            assert!(mrab.state().value(e, i, 0).abs() < 1e-11);
            assert!(mrab.state().value(e, i, 1).abs() < 1e-11);
        }
    }
}

#[test]
fn test_trace_projection_keeps_constants_across_degrees() {
    let tables = ReferenceTables::new(Dimension::Three, 4).unwrap();
    let trace = tables.trace();
    let nf = 2;
    for n in 1..4 {
        let nfp = tables.degree(n).nfp;
        let nfp_up = tables.degree(n + 1).nfp;
        let src: Vec<f64> = (0..nfp).flat_map(|_| [1.5, -0.25]).collect();

        let mut same = vec![0.0; nfp * nf];
        trace.project(n, n, &src, &mut same, nf);
        assert_eq!(same, src);

        let mut up = vec![0.0; nfp_up * nf];
        trace.project(n, n + 1, &src, &mut up, nf);
        let mut down = vec![0.0; nfp * nf];
        trace.project(n + 1, n, &up, &mut down, nf);
        for pair in up.chunks_exact(nf).chain(down.chunks_exact(nf)) {
            assert_relative_eq!(pair[0], 1.5, epsilon = 1e-12);
            assert_relative_eq!(pair[1], -0.25, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_linear_pressure_rhs_is_exact_on_mixed_degree_tetrahedra() {
    // ∂u/∂t = -∇p is constant and ∂p/∂t = 0 for every degree pairing
    let tables = ReferenceTables::new(Dimension::Three, 3).unwrap();
    let mesh = BoxMesh::new([0.0; 3], [1.0; 3], [2, 2, 2]).build().unwrap();
    let degrees: Vec<usize> = (0..mesh.n_total()).map(|e| 2 + e % 2).collect();
    let topo = MeshTopology::new(mesh, degrees, &tables).unwrap();
    let physics = Acoustics::three_d();
    let mut mrab = single_level(&topo, &tables, &physics, 0.005);

    let grad = [0.5, -0.25, 0.75];
    mrab.set_initial(0.0, |x, q| {
        q.fill(0.0);
        q[3] = 1.0 + grad[0] * x[0] + grad[1] * x[1] + grad[2] * x[2];
    });
    let lev = LevelIndex::ZERO;
    mrab.exchange_traces(&mut SerialHalo);
    mrab.compute_rhs(lev, 0.0);

    let state = mrab.state();
    let rhs = state.rhs().plane(state.shift(lev).current());
    for e in ElementIndex::iter(topo.n_elements()) {
        for i in 0..topo.np(e) {
            for a in 0..3 {
                let v = rhs[state.volume_index(e, i, a)];
                assert_relative_eq!(v, -grad[a], epsilon = 1e-10);
            }
            assert!(rhs[state.volume_index(e, i, 3)].abs() < 1e-10);
        }
    }
}
