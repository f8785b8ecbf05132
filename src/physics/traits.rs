//! Physics capability traits.
//!
//! The MRAB engine only needs a handful of pointwise operations from a
//! physics: the number of fields, the numerical flux jump on a face, the
//! state imposed by a physical boundary and the volume terms. Everything is
//! evaluated on Bernstein coefficients node by node, which is exact for the
//! linear hyperbolic systems implemented here; nonlinear source terms go
//! through [`WavePhysics::relaxation`], which the volume kernel evaluates
//! at cubature points.

use crate::mesh::PhysicalBoundary;
use crate::types::Dimension;

// =============================================================================
// Source Fields
// =============================================================================

/// Field indices receiving an acoustic point-source incident field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceFields {
    /// Velocity components (one per dimension)
    pub velocity: &'static [usize],
    /// Pressure
    pub pressure: usize,
}

// =============================================================================
// WavePhysics Trait
// =============================================================================

/// Pointwise physics evaluated by the volume, surface and update kernels.
///
/// All slices hold one value per field in the order of
/// [`WavePhysics::field_names`].
///
/// # Implementation Notes
///
/// - `compute_flux` must return exactly zero for `q_m == q_p`
/// - None of the methods may allocate; they run once per face node
pub trait WavePhysics: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Spatial dimension the physics is written for.
    fn dim(&self) -> Dimension;

    /// Number of fields per node.
    fn n_fields(&self) -> usize;

    /// Field names, e.g. `["u", "v", "p"]`.
    fn field_names(&self) -> &'static [&'static str];

    /// Flux jump `(A·n)(q* - q⁻)` on a face, before geometric scaling.
    ///
    /// # Arguments
    /// * `q_m` - Owned trace
    /// * `q_p` - Neighbour trace
    /// * `normal` - Outward unit normal
    /// * `lambda2` - Penalty parameter of the centred-plus-penalty flux
    /// * `out` - Flux jump per field
    fn compute_flux(
        &self,
        q_m: &[f64],
        q_p: &[f64],
        normal: &[f64; 3],
        lambda2: f64,
        out: &mut [f64],
    );

    /// Exterior state imposed by a physical boundary.
    ///
    /// # Arguments
    /// * `boundary` - Boundary kind
    /// * `t` - Time
    /// * `x` - Position of the face node
    /// * `normal` - Outward unit normal
    /// * `q_m` - Owned trace
    /// * `q_p` - Exterior state, overwritten
    fn boundary_state(
        &self,
        boundary: PhysicalBoundary,
        t: f64,
        x: &[f64; 3],
        normal: &[f64; 3],
        q_m: &[f64],
        q_p: &mut [f64],
    );

    /// Volume right-hand side from the state and its physical gradient.
    ///
    /// `grad[fld]` holds ∂q_fld/∂x, ∂q_fld/∂y (, ∂q_fld/∂z).
    fn volume_rhs(&self, q: &[f64], grad: &[[f64; 3]], rhs: &mut [f64]);

    /// Whether [`WavePhysics::relaxation`] contributes.
    fn has_relaxation(&self) -> bool {
        false
    }

    /// Pointwise (possibly nonlinear) source term evaluated at cubature
    /// points.
    fn relaxation(&self, _q: &[f64], out: &mut [f64]) {
        out.fill(0.0);
    }

    /// Field whose right-hand side is scaled by the local c² when a
    /// variable wave speed is active.
    fn wave_speed_field(&self) -> Option<usize> {
        None
    }

    /// Fastest characteristic speed for c = 1.
    fn max_wave_speed(&self) -> f64;

    /// Split-field PML form, if supported.
    fn pml(&self) -> Option<&dyn PmlPhysics> {
        None
    }

    /// Fields receiving a point-source incident field, if supported.
    fn source_fields(&self) -> Option<SourceFields> {
        None
    }
}

// =============================================================================
// PmlPhysics Trait
// =============================================================================

/// Split-field perfectly matched layer form of a physics.
///
/// Inside PML elements some fields are carried as split components in a
/// separate array; the regular field is recombined from them after every
/// update.
pub trait PmlPhysics: Send + Sync {
    /// Number of split fields per node.
    fn n_pml_fields(&self) -> usize;

    /// Initial split fields from a regular state.
    fn init_split(&self, q: &[f64], pml: &mut [f64]);

    /// Volume terms of both the regular and the split fields.
    fn pml_volume_rhs(&self, grad: &[[f64; 3]], rhs_q: &mut [f64], rhs_pml: &mut [f64]);

    /// Flux jumps of both the regular and the split fields.
    fn pml_flux(
        &self,
        q_m: &[f64],
        q_p: &[f64],
        normal: &[f64; 3],
        lambda2: f64,
        flux_q: &mut [f64],
        flux_pml: &mut [f64],
    );

    /// Damping terms for absorption coefficients `sigma` per axis.
    fn pml_damping(
        &self,
        sigma: &[f64; 3],
        q: &[f64],
        pml: &[f64],
        out_q: &mut [f64],
        out_pml: &mut [f64],
    );

    /// Rebuild the regular fields carried by the split components.
    fn combine_split(&self, pml: &[f64], q: &mut [f64]);

    /// Split fields whose right-hand side is scaled by c².
    fn wave_speed_fields(&self) -> std::ops::Range<usize> {
        0..self.n_pml_fields()
    }
}
