//! Volume right-hand side.
//!
//! For each element the reference derivatives are applied to the Bernstein
//! coefficients with the sparse BB derivative operators, mapped to physical
//! gradients by the affine metric and handed to the physics node by node.
//! The result overwrites the current RHS generation; the surface kernel
//! accumulates into it afterwards.
//!
//! Relaxation terms and PML damping are pointwise in physical space and go
//! through the cubature: interpolate, evaluate, project, add.

use super::state::SolverState;
use super::{KernelContext, block};
use crate::mesh::LevelElements;
use crate::physics::PmlPhysics;
use crate::types::ElementIndex;

/// Per-thread work buffers.
pub(crate) struct VolumeScratch {
    dq: Vec<Vec<f64>>,
    grad: Vec<[f64; 3]>,
    cub_q: Vec<f64>,
    cub_out: Vec<f64>,
    projected: Vec<f64>,
    cub_pml: Vec<f64>,
    cub_pml_out: Vec<f64>,
    projected_pml: Vec<f64>,
}

impl VolumeScratch {
    pub(crate) fn new(ctx: &KernelContext, n_fields: usize, n_pml_fields: usize) -> Self {
        let np_max = ctx.tables.np_max();
        let n_cub = ctx.tables.n_cub_max();
        let d = ctx.topo.dim().n_dims();
        Self {
            dq: vec![vec![0.0; np_max * n_fields]; d],
            grad: vec![[0.0; 3]; n_fields],
            cub_q: vec![0.0; n_cub * n_fields],
            cub_out: vec![0.0; n_cub * n_fields],
            projected: vec![0.0; np_max * n_fields],
            cub_pml: vec![0.0; n_cub * n_pml_fields],
            cub_pml_out: vec![0.0; n_cub * n_pml_fields],
            projected_pml: vec![0.0; np_max * n_pml_fields],
        }
    }
}

/// Reference derivatives of an element block.
fn reference_derivatives(
    ctx: &KernelContext,
    e: ElementIndex,
    q_e: &[f64],
    n_fields: usize,
    dq: &mut [Vec<f64>],
) {
    let ops = ctx.tables.degree(ctx.topo.degree(e));
    for (op, out) in ops.derivatives.iter().zip(dq.iter_mut()) {
        op.apply(q_e, out, n_fields);
    }
}

/// grad[fld][a] = Σ_k ∂r_k/∂x_a ∂q_fld/∂r_k at node `i`.
#[inline]
fn physical_gradient(
    dq: &[Vec<f64>],
    metric: &[[f64; 3]; 3],
    i: usize,
    n_fields: usize,
    grad: &mut [[f64; 3]],
) {
    let d = dq.len();
    for (fld, g) in grad.iter_mut().enumerate().take(n_fields) {
        *g = [0.0; 3];
        for (k, dk) in dq.iter().enumerate() {
            let v = dk[i * n_fields + fld];
            for a in 0..d {
                g[a] += metric[k][a] * v;
            }
        }
    }
}

/// Volume RHS of one regular element.
pub(crate) fn volume_element(
    ctx: &KernelContext,
    e: ElementIndex,
    q_e: &[f64],
    rhs_e: &mut [f64],
    s: &mut VolumeScratch,
) {
    let physics = ctx.physics;
    let nf = physics.n_fields();
    let ops = ctx.tables.degree(ctx.topo.degree(e));
    let np = ops.np;
    let metric = &ctx.topo.volume(e).metric;

    reference_derivatives(ctx, e, q_e, nf, &mut s.dq);
    for i in 0..np {
        physical_gradient(&s.dq, metric, i, nf, &mut s.grad);
        physics.volume_rhs(
            &q_e[i * nf..(i + 1) * nf],
            &s.grad,
            &mut rhs_e[i * nf..(i + 1) * nf],
        );
    }

    if physics.has_relaxation() {
        let cub = &ops.cubature;
        let n_cub = cub.n_cub();
        cub.interpolate(&q_e[..np * nf], &mut s.cub_q[..n_cub * nf], nf);
        for k in 0..n_cub {
            physics.relaxation(
                &s.cub_q[k * nf..(k + 1) * nf],
                &mut s.cub_out[k * nf..(k + 1) * nf],
            );
        }
        cub.project(&s.cub_out[..n_cub * nf], &mut s.projected[..np * nf], nf);
        for (r, p) in rhs_e[..np * nf].iter_mut().zip(&s.projected) {
            *r += p;
        }
    }
}

/// Volume RHS of one PML element, regular and split fields.
#[allow(clippy::too_many_arguments)]
pub(crate) fn pml_volume_element(
    ctx: &KernelContext,
    pml_physics: &dyn PmlPhysics,
    e: ElementIndex,
    pml_id: usize,
    q_e: &[f64],
    pml_e: &[f64],
    rhs_e: &mut [f64],
    rhs_pml_e: &mut [f64],
    s: &mut VolumeScratch,
) {
    let nf = ctx.physics.n_fields();
    let npf = pml_physics.n_pml_fields();
    let ops = ctx.tables.degree(ctx.topo.degree(e));
    let np = ops.np;
    let metric = &ctx.topo.volume(e).metric;

    reference_derivatives(ctx, e, q_e, nf, &mut s.dq);
    for i in 0..np {
        physical_gradient(&s.dq, metric, i, nf, &mut s.grad);
        pml_physics.pml_volume_rhs(
            &s.grad,
            &mut rhs_e[i * nf..(i + 1) * nf],
            &mut rhs_pml_e[i * npf..(i + 1) * npf],
        );
    }

    let Some(profile) = ctx.pml else {
        return;
    };
    let cub = &ops.cubature;
    let n_cub = cub.n_cub();
    cub.interpolate(&q_e[..np * nf], &mut s.cub_q[..n_cub * nf], nf);
    cub.interpolate(&pml_e[..np * npf], &mut s.cub_pml[..n_cub * npf], npf);
    for k in 0..n_cub {
        pml_physics.pml_damping(
            profile.sigma(pml_id, k),
            &s.cub_q[k * nf..(k + 1) * nf],
            &s.cub_pml[k * npf..(k + 1) * npf],
            &mut s.cub_out[k * nf..(k + 1) * nf],
            &mut s.cub_pml_out[k * npf..(k + 1) * npf],
        );
    }
    cub.project(&s.cub_out[..n_cub * nf], &mut s.projected[..np * nf], nf);
    cub.project(
        &s.cub_pml_out[..n_cub * npf],
        &mut s.projected_pml[..np * npf],
        npf,
    );
    for (r, p) in rhs_e[..np * nf].iter_mut().zip(&s.projected) {
        *r += p;
    }
    for (r, p) in rhs_pml_e[..np * npf].iter_mut().zip(&s.projected_pml) {
        *r += p;
    }
}

/// PML elements of a level; shared by the serial and parallel drivers.
fn pml_volume_rhs(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    slot: usize,
    s: &mut VolumeScratch,
) {
    let Some(pml_physics) = ctx.physics.pml() else {
        return;
    };
    let stride = state.volume_stride();
    let pml_stride = state.pml_stride();
    let SolverState { q, rhs, pml, .. } = state;
    let Some(pml) = pml.as_mut() else {
        return;
    };
    let rhs_plane = rhs.plane_mut(slot);
    let pml_plane = pml.rhs.plane_mut(slot);

    for (&e, &id) in elems.pml_element_ids.iter().zip(&elems.pml_ids) {
        let split = id * pml_stride..(id + 1) * pml_stride;
        pml_volume_element(
            ctx,
            pml_physics,
            e,
            id,
            &q[block(e, stride)],
            &pml.q[split.clone()],
            &mut rhs_plane[block(e, stride)],
            &mut pml_plane[split],
            s,
        );
    }
}

/// Volume RHS of every element of a level into RHS slot `slot`.
///
/// # Arguments
/// * `ctx` - Kernel inputs
/// * `state` - Solver state (reads `q`, writes the RHS slot)
/// * `elems` - Elements of the level
/// * `slot` - Storage slot of the current generation
pub fn volume_rhs(ctx: &KernelContext, state: &mut SolverState, elems: &LevelElements, slot: usize) {
    let nf = state.n_fields();
    let n_pml_fields = state.pml().map_or(0, |p| p.n_fields);
    let mut s = VolumeScratch::new(ctx, nf, n_pml_fields);
    let stride = state.volume_stride();

    {
        let SolverState { q, rhs, .. } = &mut *state;
        let plane = rhs.plane_mut(slot);
        for &e in &elems.element_ids {
            volume_element(ctx, e, &q[block(e, stride)], &mut plane[block(e, stride)], &mut s);
        }
    }

    pml_volume_rhs(ctx, state, elems, slot, &mut s);
}

/// Parallel version of [`volume_rhs`] using Rayon.
///
/// Regular elements run concurrently over disjoint RHS blocks; PML
/// elements run serially afterwards.
#[cfg(feature = "parallel")]
pub fn volume_rhs_parallel(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    slot: usize,
) {
    use rayon::prelude::*;

    let nf = state.n_fields();
    let n_pml_fields = state.pml().map_or(0, |p| p.n_fields);
    let stride = state.volume_stride();
    let mask = super::element_mask(&elems.element_ids, ctx.topo.n_elements());

    {
        let SolverState { q, rhs, .. } = &mut *state;
        let q: &[f64] = q;
        rhs.plane_mut(slot)
            .par_chunks_mut(stride)
            .enumerate()
            .filter(|(e, _)| mask[*e])
            .for_each_init(
                || VolumeScratch::new(ctx, nf, 0),
                |s, (e, rhs_e)| {
                    let e = ElementIndex::new(e);
                    volume_element(ctx, e, &q[block(e, stride)], rhs_e, s);
                },
            );
    }

    let mut s = VolumeScratch::new(ctx, nf, n_pml_fields);
    pml_volume_rhs(ctx, state, elems, slot, &mut s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{LevelConfig, MeshTopology, MrabLevels, RectangleMesh};
    use crate::operators::ReferenceTables;
    use crate::parallel::SerialHalo;
    use crate::physics::{Acoustics, WavePhysics};
    use crate::types::{Dimension, LevelIndex};
    use approx::assert_relative_eq;

    struct Setup {
        tables: ReferenceTables,
        topo: MeshTopology,
        levels: MrabLevels,
    }

    fn setup(n: usize) -> Setup {
        let tables = ReferenceTables::new(Dimension::Two, n).unwrap();
        let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 2, 2).build().unwrap();
        let n_total = mesh.n_total();
        let topo = MeshTopology::new(mesh, vec![n; n_total], &tables).unwrap();
        let levels = MrabLevels::build(
            topo.mesh(),
            &vec![1.0; topo.n_elements()],
            &LevelConfig::default(),
            &mut SerialHalo,
        )
        .unwrap();
        Setup {
            tables,
            topo,
            levels,
        }
    }

    /// Fill q with nodal values of `f` at the Bernstein domain points.
    fn fill(s: &Setup, state: &mut SolverState, f: impl Fn(&[f64; 3]) -> [f64; 3]) {
        for e in ElementIndex::iter(s.topo.n_elements()) {
            let ops = s.tables.degree(s.topo.degree(e));
            let mut nodal = vec![0.0; ops.np * 3];
            for i in 0..ops.np {
                nodal[i * 3..i * 3 + 3].copy_from_slice(&f(&s.topo.node(e, i)));
            }
            let start = state.volume_index(e, 0, 0);
            ops.volume_vandermonde
                .nodal_to_bb(&nodal, &mut state.q_mut()[start..start + ops.np * 3], 3);
        }
    }

    #[test]
    fn test_linear_pressure_gives_constant_velocity_rhs() {
        let s = setup(2);
        let physics = Acoustics::two_d();
        let ctx = KernelContext::new(&s.topo, &s.tables, &physics, 0.5);
        let mut state = SolverState::new(&s.topo, physics.n_fields(), 1, None);
        // p = 2x - y, u = 3y, v = x
        fill(&s, &mut state, |x| [3.0 * x[1], x[0], 2.0 * x[0] - x[1]]);

        volume_rhs(&ctx, &mut state, s.levels.elements(LevelIndex::ZERO), 0);

        let rhs = state.rhs().plane(0);
        for e in ElementIndex::iter(s.topo.n_elements()) {
            for i in 0..6 {
                let base = state.volume_index(e, i, 0);
                assert_relative_eq!(rhs[base], -2.0, epsilon = 1e-10);
                assert_relative_eq!(rhs[base + 1], 1.0, epsilon = 1e-10);
                // div u = 0
                assert_relative_eq!(rhs[base + 2], 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_only_level_elements_written() {
        let s = setup(1);
        let physics = Acoustics::two_d();
        let ctx = KernelContext::new(&s.topo, &s.tables, &physics, 0.5);
        let mut state = SolverState::new(&s.topo, 3, 1, None);
        fill(&s, &mut state, |x| [0.0, 0.0, x[0]]);

        let mut elems = s.levels.elements(LevelIndex::ZERO).clone();
        elems.element_ids.truncate(1);
        volume_rhs(&ctx, &mut state, &elems, 2);

        let rhs = state.rhs().plane(2);
        assert!(rhs[..state.volume_stride()].iter().any(|&v| v != 0.0));
        assert!(rhs[state.volume_stride()..].iter().all(|&v| v == 0.0));
        assert!(state.rhs().plane(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    #[cfg(feature = "parallel")]
    fn test_parallel_matches_serial() {
        let s = setup(3);
        let physics = Acoustics::two_d();
        let ctx = KernelContext::new(&s.topo, &s.tables, &physics, 0.5);
        let mut serial = SolverState::new(&s.topo, 3, 1, None);
        fill(&s, &mut serial, |x| {
            [(3.0 * x[0]).sin(), x[1] * x[1], (x[0] * x[1]).cos()]
        });
        let mut parallel = serial.clone();

        let elems = s.levels.elements(LevelIndex::ZERO);
        volume_rhs(&ctx, &mut serial, elems, 0);
        volume_rhs_parallel(&ctx, &mut parallel, elems, 0);
        assert_eq!(serial.rhs().plane(0), parallel.rhs().plane(0));
    }
}
