//! DG kernels of the MRAB engine.
//!
//! # Submodules
//!
//! - [`state`]: fields, RHS history, traces ([`SolverState`])
//! - [`volume`]: volume RHS (derivatives, relaxation, PML split terms)
//! - [`surface`]: face fluxes and the sparse Bernstein-Bezier lift
//! - [`update`]: AB integration, trace rebuild and projection
//! - [`wadg`]: variable wave speed ([`WaveSpeed`])
//! - [`diagnostics`]: norms and non-finite detection
//!
//! Kernels operate on one MRAB level at a time and take the element lists
//! of that level. Every kernel has a `_parallel` twin behind the `parallel`
//! feature that runs elements concurrently over disjoint blocks.

pub mod diagnostics;
pub mod state;
pub mod surface;
pub mod update;
pub mod volume;
pub mod wadg;

pub use diagnostics::{FieldNorms, first_non_finite};
pub use state::{PmlState, RhsHistory, SolverState};
pub use surface::surface_rhs;
pub use update::{advance_and_project, project_only};
pub use volume::volume_rhs;
pub use wadg::WaveSpeed;

#[cfg(feature = "parallel")]
pub use surface::surface_rhs_parallel;
#[cfg(feature = "parallel")]
pub use update::{advance_and_project_parallel, project_only_parallel};
#[cfg(feature = "parallel")]
pub use volume::volume_rhs_parallel;

use crate::mesh::MeshTopology;
use crate::operators::ReferenceTables;
use crate::physics::WavePhysics;
use crate::source::{PmlProfile, SourcePatch};
use crate::types::ElementIndex;

/// Numerical flux parameters.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    /// Penalty of the centred-plus-penalty flux (1/2 = upwind, 0 = centred)
    pub lambda2: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { lambda2: 0.5 }
    }
}

impl SolverConfig {
    /// Set the flux penalty.
    pub fn with_lambda2(mut self, lambda2: f64) -> Self {
        self.lambda2 = lambda2;
        self
    }
}

/// Read-only inputs shared by all kernels.
#[derive(Clone, Copy)]
pub struct KernelContext<'a> {
    /// Mesh topology
    pub topo: &'a MeshTopology,
    /// Reference operators
    pub tables: &'a ReferenceTables,
    /// Physics
    pub physics: &'a dyn WavePhysics,
    /// Flux penalty
    pub lambda2: f64,
    /// Point source and its patch faces
    pub source: Option<&'a SourcePatch>,
    /// Variable wave speed
    pub wave_speed: Option<&'a WaveSpeed>,
    /// PML damping profile
    pub pml: Option<&'a PmlProfile>,
}

impl<'a> KernelContext<'a> {
    /// Context without source, variable speed or PML.
    pub fn new(
        topo: &'a MeshTopology,
        tables: &'a ReferenceTables,
        physics: &'a dyn WavePhysics,
        lambda2: f64,
    ) -> Self {
        Self {
            topo,
            tables,
            physics,
            lambda2,
            source: None,
            wave_speed: None,
            pml: None,
        }
    }
}

/// Membership mask of `ids` over `n` elements.
#[cfg(feature = "parallel")]
pub(crate) fn element_mask(ids: &[ElementIndex], n: usize) -> Vec<bool> {
    let mut mask = vec![false; n];
    for &e in ids {
        mask[e] = true;
    }
    mask
}

/// Range of an element's block in a flat array with `stride` entries per
/// element.
#[inline]
pub(crate) fn block(e: ElementIndex, stride: usize) -> std::ops::Range<usize> {
    e.get() * stride..(e.get() + 1) * stride
}
