//! Surface right-hand side.
//!
//! Each face node pairs the owned trace `fqm` with the exterior state: the
//! neighbour's projected trace `fqp` through `map_p`, or the state imposed
//! by a physical boundary. The flux jump is scaled by sJ/J and lifted to
//! the volume with the two-stage sparse Bernstein-Bezier lift, then added
//! to the current RHS generation.

use super::state::SolverState;
use super::{KernelContext, block};
use crate::mesh::LevelElements;
use crate::physics::PmlPhysics;
use crate::types::ElementIndex;

/// Per-thread work buffers.
pub(crate) struct SurfaceScratch {
    q_p: Vec<f64>,
    flux: Vec<f64>,
    flux_pml: Vec<f64>,
    lift_work: Vec<f64>,
    lifted: Vec<f64>,
    lifted_pml: Vec<f64>,
}

impl SurfaceScratch {
    pub(crate) fn new(ctx: &KernelContext, n_fields: usize, n_pml_fields: usize) -> Self {
        let faces = ctx.topo.n_faces() * ctx.topo.nfp_max();
        let np_max = ctx.topo.np_max();
        let widest = n_fields.max(n_pml_fields);
        Self {
            q_p: vec![0.0; n_fields],
            flux: vec![0.0; faces * n_fields],
            flux_pml: vec![0.0; faces * n_pml_fields],
            lift_work: vec![0.0; faces * widest],
            lifted: vec![0.0; np_max * n_fields],
            lifted_pml: vec![0.0; np_max * n_pml_fields],
        }
    }
}

/// Exterior state of face node `(e, f, n)`, written to `q_p` for physical
/// boundaries; otherwise returns the neighbour trace (or `q_m` when the
/// node has no match).
#[inline]
#[allow(clippy::too_many_arguments)]
fn exterior<'a>(
    ctx: &KernelContext,
    e: ElementIndex,
    f: usize,
    n: usize,
    t: f64,
    q_m: &'a [f64],
    fqp: &'a [f64],
    q_p: &'a mut [f64],
) -> &'a [f64] {
    let nf = q_m.len();
    let topo = ctx.topo;
    if let Some(boundary) = topo.boundary(e, f).physical() {
        let normal = &topo.surface(e, f).normal;
        ctx.physics
            .boundary_state(boundary, t, &topo.face_node(e, f, n), normal, q_m, q_p);
        return q_p;
    }
    match topo.map_p(e, f, n) {
        Some(m) => &fqp[m * nf..(m + 1) * nf],
        None => q_m,
    }
}

/// Surface RHS of one regular element, accumulated into `rhs_e`.
pub(crate) fn surface_element(
    ctx: &KernelContext,
    e: ElementIndex,
    t: f64,
    fqm: &[f64],
    fqp: &[f64],
    rhs_e: &mut [f64],
    s: &mut SurfaceScratch,
) {
    let topo = ctx.topo;
    let nf = ctx.physics.n_fields();
    let ops = ctx.tables.degree(topo.degree(e));
    let (np, nfp) = (ops.np, ops.nfp);
    let n_faces = topo.n_faces();

    for f in 0..n_faces {
        let geo = topo.surface(e, f);
        let scale = geo.lift_scale();
        for n in 0..nfp {
            let own = topo.trace_node(e, f, n) * nf;
            let q_m = &fqm[own..own + nf];
            let q_p = exterior(ctx, e, f, n, t, q_m, fqp, &mut s.q_p);
            let out = &mut s.flux[(f * nfp + n) * nf..(f * nfp + n + 1) * nf];
            ctx.physics
                .compute_flux(q_m, q_p, &geo.normal, ctx.lambda2, out);
            for v in out.iter_mut() {
                *v *= scale;
            }
        }
    }

    let len = n_faces * nfp * nf;
    ops.lift.apply(
        &s.flux[..len],
        &mut s.lift_work[..len],
        &mut s.lifted[..np * nf],
        nf,
    );
    for (r, l) in rhs_e[..np * nf].iter_mut().zip(&s.lifted) {
        *r += l;
    }
}

/// Surface RHS of one PML element, regular and split fields.
#[allow(clippy::too_many_arguments)]
pub(crate) fn pml_surface_element(
    ctx: &KernelContext,
    pml_physics: &dyn PmlPhysics,
    e: ElementIndex,
    t: f64,
    fqm: &[f64],
    fqp: &[f64],
    rhs_e: &mut [f64],
    rhs_pml_e: &mut [f64],
    s: &mut SurfaceScratch,
) {
    let topo = ctx.topo;
    let nf = ctx.physics.n_fields();
    let npf = pml_physics.n_pml_fields();
    let ops = ctx.tables.degree(topo.degree(e));
    let (np, nfp) = (ops.np, ops.nfp);
    let n_faces = topo.n_faces();

    for f in 0..n_faces {
        let geo = topo.surface(e, f);
        let scale = geo.lift_scale();
        for n in 0..nfp {
            let own = topo.trace_node(e, f, n) * nf;
            let q_m = &fqm[own..own + nf];
            let q_p = exterior(ctx, e, f, n, t, q_m, fqp, &mut s.q_p);
            let k = f * nfp + n;
            let out = &mut s.flux[k * nf..(k + 1) * nf];
            let out_pml = &mut s.flux_pml[k * npf..(k + 1) * npf];
            pml_physics.pml_flux(q_m, q_p, &geo.normal, ctx.lambda2, out, out_pml);
            for v in out.iter_mut().chain(out_pml.iter_mut()) {
                *v *= scale;
            }
        }
    }

    let len = n_faces * nfp * nf;
    ops.lift.apply(
        &s.flux[..len],
        &mut s.lift_work[..len],
        &mut s.lifted[..np * nf],
        nf,
    );
    for (r, l) in rhs_e[..np * nf].iter_mut().zip(&s.lifted) {
        *r += l;
    }

    let len = n_faces * nfp * npf;
    ops.lift.apply(
        &s.flux_pml[..len],
        &mut s.lift_work[..len],
        &mut s.lifted_pml[..np * npf],
        npf,
    );
    for (r, l) in rhs_pml_e[..np * npf].iter_mut().zip(&s.lifted_pml) {
        *r += l;
    }
}

/// PML elements of a level; shared by the serial and parallel drivers.
fn pml_surface_rhs(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    slot: usize,
    t: f64,
    s: &mut SurfaceScratch,
) {
    let Some(pml_physics) = ctx.physics.pml() else {
        return;
    };
    let stride = state.volume_stride();
    let pml_stride = state.pml_stride();
    let SolverState {
        fqm, fqp, rhs, pml, ..
    } = state;
    let Some(pml) = pml.as_mut() else {
        return;
    };
    let rhs_plane = rhs.plane_mut(slot);
    let pml_plane = pml.rhs.plane_mut(slot);

    for (&e, &id) in elems.pml_element_ids.iter().zip(&elems.pml_ids) {
        pml_surface_element(
            ctx,
            pml_physics,
            e,
            t,
            fqm,
            fqp,
            &mut rhs_plane[block(e, stride)],
            &mut pml_plane[id * pml_stride..(id + 1) * pml_stride],
            s,
        );
    }
}

/// Add the surface RHS of every element of a level to RHS slot `slot`.
///
/// # Arguments
/// * `ctx` - Kernel inputs
/// * `state` - Solver state (reads the traces, accumulates into the RHS slot)
/// * `elems` - Elements of the level
/// * `slot` - Storage slot of the current generation
/// * `t` - Time of the traces, for time-dependent boundaries
pub fn surface_rhs(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    slot: usize,
    t: f64,
) {
    let nf = state.n_fields();
    let n_pml_fields = state.pml().map_or(0, |p| p.n_fields);
    let mut s = SurfaceScratch::new(ctx, nf, n_pml_fields);
    let stride = state.volume_stride();

    {
        let SolverState { fqm, fqp, rhs, .. } = &mut *state;
        let plane = rhs.plane_mut(slot);
        for &e in &elems.element_ids {
            surface_element(ctx, e, t, fqm, fqp, &mut plane[block(e, stride)], &mut s);
        }
    }

    pml_surface_rhs(ctx, state, elems, slot, t, &mut s);
}

/// Parallel version of [`surface_rhs`] using Rayon.
#[cfg(feature = "parallel")]
pub fn surface_rhs_parallel(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    slot: usize,
    t: f64,
) {
    use rayon::prelude::*;

    let nf = state.n_fields();
    let n_pml_fields = state.pml().map_or(0, |p| p.n_fields);
    let stride = state.volume_stride();
    let mask = super::element_mask(&elems.element_ids, ctx.topo.n_elements());

    {
        let SolverState { fqm, fqp, rhs, .. } = &mut *state;
        let (fqm, fqp): (&[f64], &[f64]) = (fqm, fqp);
        rhs.plane_mut(slot)
            .par_chunks_mut(stride)
            .enumerate()
            .filter(|(e, _)| mask[*e])
            .for_each_init(
                || SurfaceScratch::new(ctx, nf, 0),
                |s, (e, rhs_e)| {
                    surface_element(ctx, ElementIndex::new(e), t, fqm, fqp, rhs_e, s);
                },
            );
    }

    let mut s = SurfaceScratch::new(ctx, nf, n_pml_fields);
    pml_surface_rhs(ctx, state, elems, slot, t, &mut s);
}
