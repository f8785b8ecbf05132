//! Adams-Bashforth update and trace projection.
//!
//! An update integrates the fields of a level with weights over the three
//! RHS generations, rebuilds the owned traces `fqm` from the new
//! coefficients, adds the incident field on source-patch faces and
//! projects each face trace to the neighbour's degree into `fqp`.
//!
//! [`advance_and_project`] completes a level step: it commits `q` and
//! rotates the level's shift ring. [`project_only`] evaluates the same
//! update on scratch copies and only refreshes the traces, which is how
//! slow levels publish intermediate states to their faster neighbours.
//!
//! Weights are indexed by generation offset: `weights[k]` multiplies the
//! RHS in `shift.slot(k)`.

use std::ops::Range;

use super::state::{PmlState, SolverState};
use super::{KernelContext, block};
use crate::mesh::LevelElements;
use crate::time::history::ShiftRing;
use crate::types::{ElementIndex, LevelIndex};

/// One weighted update of a level.
#[derive(Clone, Copy, Debug)]
struct Stage {
    slots: [usize; 3],
    weights: [f64; 3],
    dt: f64,
    t: f64,
}

impl Stage {
    fn new(shift: ShiftRing, weights: [f64; 3], dt: f64, t: f64) -> Self {
        Self {
            slots: [shift.slot(0), shift.slot(1), shift.slot(2)],
            weights,
            dt,
            t,
        }
    }

    /// Planes reordered by generation offset.
    fn planes<'a>(&self, planes: [&'a [f64]; 3]) -> [&'a [f64]; 3] {
        [
            planes[self.slots[0]],
            planes[self.slots[1]],
            planes[self.slots[2]],
        ]
    }
}

/// Work buffers of the update kernels.
pub(crate) struct UpdateScratch {
    q: Vec<f64>,
    rhs: Vec<f64>,
    pml: Vec<f64>,
    pml_rhs: Vec<f64>,
    face: Vec<f64>,
}

impl UpdateScratch {
    fn new(state: &SolverState) -> Self {
        Self::with_sizes(
            state.volume_stride(),
            state.pml_stride(),
            state.nfp_max * state.n_fields,
        )
    }

    fn with_sizes(stride: usize, pml_stride: usize, face: usize) -> Self {
        Self {
            q: vec![0.0; stride],
            rhs: vec![0.0; stride],
            pml: vec![0.0; pml_stride],
            pml_rhs: vec![0.0; pml_stride],
            face: vec![0.0; face],
        }
    }
}

#[inline]
fn sources<'a>(planes: &[&'a [f64]; 3], r: &Range<usize>) -> [&'a [f64]; 3] {
    [
        &planes[0][r.clone()],
        &planes[1][r.clone()],
        &planes[2][r.clone()],
    ]
}

/// q += dt Σ_k w_k rhs_k over one block.
#[inline]
fn integrate(q: &mut [f64], src: &[&[f64]; 3], stage: &Stage) {
    for (&w, rhs) in stage.weights.iter().zip(src) {
        if w == 0.0 {
            continue;
        }
        let scale = stage.dt * w;
        for (qi, &ri) in q.iter_mut().zip(rhs.iter()) {
            *qi += scale * ri;
        }
    }
}

/// Rebuild the traces of element `e` from its coefficients `q_e`.
///
/// # Arguments
/// * `ctx` - Kernel inputs (source patch, trace projector)
/// * `e` - Element
/// * `q_e` - Coefficients of `e`
/// * `t` - Time of the state, for the incident field
/// * `fqm_e` - Owned trace block of `e`, overwritten
/// * `fqp_e` - Projected trace block of `e`, overwritten
/// * `face` - At least `nfp_max * n_fields` scratch values
pub(crate) fn build_traces(
    ctx: &KernelContext,
    e: ElementIndex,
    q_e: &[f64],
    t: f64,
    fqm_e: &mut [f64],
    fqp_e: &mut [f64],
    face: &mut [f64],
) {
    let topo = ctx.topo;
    let nf = ctx.physics.n_fields();
    let n = topo.degree(e);
    let nfp = ctx.tables.degree(n).nfp;
    let face_len = topo.nfp_max() * nf;
    let source = ctx.source.zip(ctx.physics.source_fields());

    for f in 0..topo.n_faces() {
        let base = f * face_len;
        for node in 0..nfp {
            let vol = topo.vmap_m(e, f, node) * nf;
            let dst = base + node * nf;
            fqm_e[dst..dst + nf].copy_from_slice(&q_e[vol..vol + nf]);
        }

        let face = &mut face[..nfp * nf];
        face.copy_from_slice(&fqm_e[base..base + nfp * nf]);
        if let Some((patch, fields)) = &source {
            patch.add_incident_trace(topo, ctx.tables, fields, e, f, t, nf, face);
        }
        ctx.tables.trace().project(
            n,
            topo.neighbor_degree(e, f),
            face,
            &mut fqp_e[base..base + face_len],
            nf,
        );
    }
}

/// Scale the current RHS of a level by c² in place.
fn scale_current(ctx: &KernelContext, state: &mut SolverState, elems: &LevelElements, slot: usize) {
    let Some(speed) = ctx.wave_speed else {
        return;
    };
    let nf = state.n_fields();
    let stride = state.volume_stride();
    let pml_stride = state.pml_stride();
    let SolverState { rhs, pml, .. } = state;

    if let Some(fld) = ctx.physics.wave_speed_field() {
        let plane = rhs.plane_mut(slot);
        for &e in &elems.element_ids {
            speed.apply(
                ctx.tables,
                ctx.topo,
                e,
                &mut plane[block(e, stride)],
                nf,
                fld..fld + 1,
            );
        }
    }
    scale_current_pml(ctx, pml.as_mut(), elems, slot, pml_stride);
}

fn scale_current_pml(
    ctx: &KernelContext,
    pml: Option<&mut PmlState>,
    elems: &LevelElements,
    slot: usize,
    pml_stride: usize,
) {
    let (Some(speed), Some(pml_physics), Some(pml)) = (ctx.wave_speed, ctx.physics.pml(), pml)
    else {
        return;
    };
    let npf = pml.n_fields;
    let plane = pml.rhs.plane_mut(slot);
    for (&e, &id) in elems.pml_element_ids.iter().zip(&elems.pml_ids) {
        speed.apply(
            ctx.tables,
            ctx.topo,
            e,
            &mut plane[id * pml_stride..(id + 1) * pml_stride],
            npf,
            pml_physics.wave_speed_fields(),
        );
    }
}

/// Update of one regular element on a scratch copy; only the traces are
/// written.
#[allow(clippy::too_many_arguments)]
fn project_element(
    ctx: &KernelContext,
    e: ElementIndex,
    q_e: &[f64],
    src: [&[f64]; 3],
    stage: &Stage,
    scale: bool,
    fqm_e: &mut [f64],
    fqp_e: &mut [f64],
    s: &mut UpdateScratch,
) {
    let nf = ctx.physics.n_fields();
    s.q.copy_from_slice(q_e);
    let mut src = src;
    if scale {
        if let (Some(speed), Some(fld)) = (ctx.wave_speed, ctx.physics.wave_speed_field()) {
            s.rhs.copy_from_slice(src[0]);
            speed.apply(ctx.tables, ctx.topo, e, &mut s.rhs, nf, fld..fld + 1);
            src[0] = &s.rhs;
        }
    }
    integrate(&mut s.q, &src, stage);
    build_traces(ctx, e, &s.q, stage.t, fqm_e, fqp_e, &mut s.face);
}

/// PML elements of a level: integrate the regular and split fields,
/// recombine and rebuild the traces. With `commit` the result is written
/// back to the state.
fn pml_update(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    stage: &Stage,
    commit: bool,
    scale: bool,
    s: &mut UpdateScratch,
) {
    let Some(pml_physics) = ctx.physics.pml() else {
        return;
    };
    let nf = state.n_fields();
    let stride = state.volume_stride();
    let pml_stride = state.pml_stride();
    let trace_stride = state.trace_stride();
    let SolverState {
        q,
        rhs,
        fqm,
        fqp,
        pml,
        ..
    } = state;
    let Some(PmlState {
        n_fields: npf,
        q: split,
        rhs: split_rhs,
    }) = pml.as_mut()
    else {
        return;
    };
    let npf = *npf;
    let planes = stage.planes(rhs.planes());
    let split_planes = stage.planes(split_rhs.planes());

    for (&e, &id) in elems.pml_element_ids.iter().zip(&elems.pml_ids) {
        let r = block(e, stride);
        let rp = id * pml_stride..(id + 1) * pml_stride;
        s.q.copy_from_slice(&q[r.clone()]);
        s.pml.copy_from_slice(&split[rp.clone()]);

        let src = sources(&planes, &r);
        let mut split_src = sources(&split_planes, &rp);
        if scale {
            if let Some(speed) = ctx.wave_speed {
                s.pml_rhs.copy_from_slice(split_src[0]);
                speed.apply(
                    ctx.tables,
                    ctx.topo,
                    e,
                    &mut s.pml_rhs,
                    npf,
                    pml_physics.wave_speed_fields(),
                );
                split_src[0] = &s.pml_rhs;
            }
        }
        integrate(&mut s.q, &src, stage);
        integrate(&mut s.pml, &split_src, stage);
        for i in 0..ctx.topo.np(e) {
            pml_physics.combine_split(
                &s.pml[i * npf..(i + 1) * npf],
                &mut s.q[i * nf..(i + 1) * nf],
            );
        }

        build_traces(
            ctx,
            e,
            &s.q,
            stage.t,
            &mut fqm[block(e, trace_stride)],
            &mut fqp[block(e, trace_stride)],
            &mut s.face,
        );
        if commit {
            q[r].copy_from_slice(&s.q);
            split[rp].copy_from_slice(&s.pml);
        }
    }
}

/// Complete a step of one level and publish its traces.
///
/// A pending c² scaling of the current RHS is applied in place first, so
/// later intermediate projections see the scaled history.
///
/// # Arguments
/// * `ctx` - Kernel inputs
/// * `state` - Solver state
/// * `elems` - Elements of the level
/// * `lev` - Level whose shift ring selects the generations
/// * `weights` - AB weights by generation offset, newest at offset 0
/// * `t` - Time reached by the step (for the incident field)
/// * `dt` - Step of the level
pub fn advance_and_project(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    lev: LevelIndex,
    weights: [f64; 3],
    t: f64,
    dt: f64,
) {
    let stage = Stage::new(state.shift(lev), weights, dt, t);
    if state.wadg_pending[lev.get()] {
        scale_current(ctx, state, elems, stage.slots[0]);
    }

    let mut s = UpdateScratch::new(state);
    let stride = state.volume_stride();
    let trace_stride = state.trace_stride();
    {
        let SolverState {
            q, rhs, fqm, fqp, ..
        } = &mut *state;
        let planes = stage.planes(rhs.planes());
        for &e in &elems.element_ids {
            let r = block(e, stride);
            let q_e = &mut q[r.clone()];
            integrate(q_e, &sources(&planes, &r), &stage);
            build_traces(
                ctx,
                e,
                q_e,
                t,
                &mut fqm[block(e, trace_stride)],
                &mut fqp[block(e, trace_stride)],
                &mut s.face,
            );
        }
    }
    pml_update(ctx, state, elems, &stage, true, false, &mut s);

    state.shifts[lev.get()].advance();
    state.wadg_pending[lev.get()] = false;
}

/// Publish the traces of an intermediate state of a level without
/// changing `q` or the history.
///
/// Takes the same arguments as [`advance_and_project`]; after a completed
/// step the weights come from [`crate::time::AdamsBashforth::rewind`].
pub fn project_only(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    lev: LevelIndex,
    weights: [f64; 3],
    t: f64,
    dt: f64,
) {
    let stage = Stage::new(state.shift(lev), weights, dt, t);
    let scale = state.wadg_pending[lev.get()] && ctx.wave_speed.is_some();

    let mut s = UpdateScratch::new(state);
    let stride = state.volume_stride();
    let trace_stride = state.trace_stride();
    {
        let SolverState {
            q, rhs, fqm, fqp, ..
        } = &mut *state;
        let planes = stage.planes(rhs.planes());
        for &e in &elems.element_ids {
            let r = block(e, stride);
            project_element(
                ctx,
                e,
                &q[r.clone()],
                sources(&planes, &r),
                &stage,
                scale,
                &mut fqm[block(e, trace_stride)],
                &mut fqp[block(e, trace_stride)],
                &mut s,
            );
        }
    }
    pml_update(ctx, state, elems, &stage, false, scale, &mut s);
}

/// Parallel version of [`advance_and_project`] using Rayon.
///
/// Regular elements update concurrently over disjoint `q` and trace
/// blocks; PML elements run serially afterwards.
#[cfg(feature = "parallel")]
pub fn advance_and_project_parallel(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    lev: LevelIndex,
    weights: [f64; 3],
    t: f64,
    dt: f64,
) {
    use rayon::prelude::*;

    let stage = Stage::new(state.shift(lev), weights, dt, t);
    let stride = state.volume_stride();
    let trace_stride = state.trace_stride();
    let nf = state.n_fields();
    let face_len = state.nfp_max * nf;
    let mask = super::element_mask(&elems.element_ids, ctx.topo.n_elements());

    if state.wadg_pending[lev.get()] {
        if let (Some(speed), Some(fld)) = (ctx.wave_speed, ctx.physics.wave_speed_field()) {
            state
                .rhs
                .plane_mut(stage.slots[0])
                .par_chunks_mut(stride)
                .enumerate()
                .filter(|(e, _)| mask[*e])
                .for_each(|(e, rhs_e)| {
                    let e = ElementIndex::new(e);
                    speed.apply(ctx.tables, ctx.topo, e, rhs_e, nf, fld..fld + 1);
                });
        }
        let pml_stride = state.pml_stride();
        scale_current_pml(ctx, state.pml.as_mut(), elems, stage.slots[0], pml_stride);
    }

    {
        let SolverState {
            q, rhs, fqm, fqp, ..
        } = &mut *state;
        let planes = stage.planes(rhs.planes());
        q.par_chunks_mut(stride)
            .zip(fqm.par_chunks_mut(trace_stride))
            .zip(fqp.par_chunks_mut(trace_stride))
            .enumerate()
            .filter(|(e, _)| mask[*e])
            .for_each_init(
                || vec![0.0; face_len],
                |face, (e, ((q_e, fqm_e), fqp_e))| {
                    let e = ElementIndex::new(e);
                    integrate(q_e, &sources(&planes, &block(e, stride)), &stage);
                    build_traces(ctx, e, q_e, stage.t, fqm_e, fqp_e, face);
                },
            );
    }

    let mut s = UpdateScratch::new(state);
    pml_update(ctx, state, elems, &stage, true, false, &mut s);

    state.shifts[lev.get()].advance();
    state.wadg_pending[lev.get()] = false;
}

/// Parallel version of [`project_only`] using Rayon.
#[cfg(feature = "parallel")]
pub fn project_only_parallel(
    ctx: &KernelContext,
    state: &mut SolverState,
    elems: &LevelElements,
    lev: LevelIndex,
    weights: [f64; 3],
    t: f64,
    dt: f64,
) {
    use rayon::prelude::*;

    let stage = Stage::new(state.shift(lev), weights, dt, t);
    let scale = state.wadg_pending[lev.get()] && ctx.wave_speed.is_some();
    let stride = state.volume_stride();
    let trace_stride = state.trace_stride();
    let mask = super::element_mask(&elems.element_ids, ctx.topo.n_elements());

    {
        let sizes = (stride, state.nfp_max * state.n_fields);
        let SolverState {
            q, rhs, fqm, fqp, ..
        } = &mut *state;
        let q: &[f64] = q;
        let planes = stage.planes(rhs.planes());
        fqm.par_chunks_mut(trace_stride)
            .zip(fqp.par_chunks_mut(trace_stride))
            .take(ctx.topo.n_elements())
            .enumerate()
            .filter(|(e, _)| mask[*e])
            .for_each_init(
                || UpdateScratch::with_sizes(sizes.0, 0, sizes.1),
                |s, (e, (fqm_e, fqp_e))| {
                    let e = ElementIndex::new(e);
                    let r = block(e, stride);
                    project_element(
                        ctx,
                        e,
                        &q[r.clone()],
                        sources(&planes, &r),
                        &stage,
                        scale,
                        fqm_e,
                        fqp_e,
                        s,
                    );
                },
            );
    }

    let mut s = UpdateScratch::new(state);
    pml_update(ctx, state, elems, &stage, false, scale, &mut s);
}
