//! Solver state over flat storage.
//!
//! Layouts, with `nf` fields interleaved innermost:
//!
//! - `q`, RHS planes: `(e * np_max + i) * nf + fld`
//! - `fqm`, `fqp`: `((e * n_faces + f) * nfp_max + n) * nf + fld`
//! - PML `q` and RHS planes: `(pml_id * np_max + i) * n_pml + fld`
//!
//! `q` and the RHS history cover local elements only; the traces include
//! the halo tail filled by the exchange.

use crate::mesh::MeshTopology;
use crate::time::history::{N_GENERATIONS, ShiftRing};
use crate::types::{ElementIndex, LevelIndex};

/// Three RHS storage planes, selected by a level's [`ShiftRing`].
#[derive(Clone, Debug)]
pub struct RhsHistory {
    planes: [Vec<f64>; N_GENERATIONS],
}

impl RhsHistory {
    /// Zeroed history of `len` entries per plane.
    pub fn new(len: usize) -> Self {
        Self {
            planes: [vec![0.0; len], vec![0.0; len], vec![0.0; len]],
        }
    }

    /// One storage slot.
    #[inline]
    pub fn plane(&self, slot: usize) -> &[f64] {
        &self.planes[slot]
    }

    /// One storage slot, mutable.
    #[inline]
    pub fn plane_mut(&mut self, slot: usize) -> &mut [f64] {
        &mut self.planes[slot]
    }

    /// All three slots in storage order.
    #[inline]
    pub fn planes(&self) -> [&[f64]; N_GENERATIONS] {
        [&self.planes[0], &self.planes[1], &self.planes[2]]
    }

    /// Clear every generation.
    pub fn reset(&mut self) {
        for plane in &mut self.planes {
            plane.fill(0.0);
        }
    }
}

/// Split fields of PML elements.
#[derive(Clone, Debug)]
pub struct PmlState {
    /// Number of split fields
    pub n_fields: usize,
    /// Split field coefficients
    pub q: Vec<f64>,
    /// Split field RHS history
    pub rhs: RhsHistory,
}

/// Fields, RHS history, traces and shift rings of a run.
#[derive(Clone, Debug)]
pub struct SolverState {
    pub(crate) n_fields: usize,
    pub(crate) np_max: usize,
    pub(crate) nfp_max: usize,
    pub(crate) n_faces: usize,
    pub(crate) n_elements: usize,
    pub(crate) q: Vec<f64>,
    pub(crate) rhs: RhsHistory,
    pub(crate) fqm: Vec<f64>,
    pub(crate) fqp: Vec<f64>,
    pub(crate) shifts: Vec<ShiftRing>,
    pub(crate) wadg_pending: Vec<bool>,
    pub(crate) pml: Option<PmlState>,
}

impl SolverState {
    /// Zero state for a topology.
    ///
    /// # Arguments
    /// * `topo` - Mesh topology (strides and element counts)
    /// * `n_fields` - Fields per node
    /// * `n_levels` - Number of MRAB levels (one shift ring each)
    /// * `pml` - `(n_pml_elements, n_pml_fields)` when PML elements exist
    pub fn new(
        topo: &MeshTopology,
        n_fields: usize,
        n_levels: usize,
        pml: Option<(usize, usize)>,
    ) -> Self {
        let np_max = topo.np_max();
        let nfp_max = topo.nfp_max();
        let n_faces = topo.n_faces();
        let n_elements = topo.n_elements();
        let volume_len = n_elements * np_max * n_fields;
        let trace_len = topo.n_total() * n_faces * nfp_max * n_fields;

        Self {
            n_fields,
            np_max,
            nfp_max,
            n_faces,
            n_elements,
            q: vec![0.0; volume_len],
            rhs: RhsHistory::new(volume_len),
            fqm: vec![0.0; trace_len],
            fqp: vec![0.0; trace_len],
            shifts: vec![ShiftRing::new(); n_levels],
            wadg_pending: vec![false; n_levels],
            pml: pml.map(|(n_pml, n_pml_fields)| {
                let len = n_pml * np_max * n_pml_fields;
                PmlState {
                    n_fields: n_pml_fields,
                    q: vec![0.0; len],
                    rhs: RhsHistory::new(len),
                }
            }),
        }
    }

    /// Fields per node.
    pub fn n_fields(&self) -> usize {
        self.n_fields
    }

    /// Entries of one element's volume block.
    #[inline]
    pub fn volume_stride(&self) -> usize {
        self.np_max * self.n_fields
    }

    /// Entries of one PML element's split-field block.
    #[inline]
    pub fn pml_stride(&self) -> usize {
        self.np_max * self.pml.as_ref().map_or(0, |p| p.n_fields)
    }

    /// Entries of one element's trace block (all faces).
    #[inline]
    pub fn trace_stride(&self) -> usize {
        self.n_faces * self.nfp_max * self.n_fields
    }

    /// Offset of `(e, i, fld)` in `q` and the RHS planes.
    #[inline]
    pub fn volume_index(&self, e: ElementIndex, i: usize, fld: usize) -> usize {
        (e.get() * self.np_max + i) * self.n_fields + fld
    }

    /// Offset of `(e, f, n, fld)` in the traces.
    #[inline]
    pub fn trace_index(&self, e: ElementIndex, f: usize, n: usize, fld: usize) -> usize {
        ((e.get() * self.n_faces + f) * self.nfp_max + n) * self.n_fields + fld
    }

    /// All field coefficients.
    pub fn q(&self) -> &[f64] {
        &self.q
    }

    /// All field coefficients, mutable.
    pub fn q_mut(&mut self) -> &mut [f64] {
        &mut self.q
    }

    /// Coefficients of element `e`.
    #[inline]
    pub fn element(&self, e: ElementIndex) -> &[f64] {
        let stride = self.volume_stride();
        &self.q[e.get() * stride..(e.get() + 1) * stride]
    }

    /// Coefficient `(e, i, fld)`.
    #[inline]
    pub fn value(&self, e: ElementIndex, i: usize, fld: usize) -> f64 {
        self.q[self.volume_index(e, i, fld)]
    }

    /// RHS history.
    pub fn rhs(&self) -> &RhsHistory {
        &self.rhs
    }

    /// RHS history, mutable.
    pub fn rhs_mut(&mut self) -> &mut RhsHistory {
        &mut self.rhs
    }

    /// Owned traces.
    pub fn fqm(&self) -> &[f64] {
        &self.fqm
    }

    /// Projected traces (with source injection), halo tail included.
    pub fn fqp(&self) -> &[f64] {
        &self.fqp
    }

    /// Projected traces, mutable (for halo exchange).
    pub fn fqp_mut(&mut self) -> &mut [f64] {
        &mut self.fqp
    }

    /// Shift ring of a level.
    #[inline]
    pub fn shift(&self, lev: LevelIndex) -> ShiftRing {
        self.shifts[lev.get()]
    }

    /// Shift ring of a level, mutable.
    pub fn shift_mut(&mut self, lev: LevelIndex) -> &mut ShiftRing {
        &mut self.shifts[lev.get()]
    }

    /// PML split fields, when present.
    pub fn pml(&self) -> Option<&PmlState> {
        self.pml.as_ref()
    }

    /// PML split fields, mutable.
    pub fn pml_mut(&mut self) -> Option<&mut PmlState> {
        self.pml.as_mut()
    }

    /// Clear the RHS history and shift rings.
    pub fn reset_history(&mut self) {
        self.rhs.reset();
        if let Some(pml) = &mut self.pml {
            pml.rhs.reset();
        }
        self.shifts.fill(ShiftRing::new());
        self.wadg_pending.fill(false);
    }
}
