//! Per-element polynomial degree selection.
//!
//! Degrees follow a points-per-wavelength rule for a fixed target angular
//! frequency:
//!
//! N = clamp(ceil(0.5 ω h / sqrt(c²_min) - 1), 1, N_max)
//!
//! with h the worst-face length scale of the element and c²_min the
//! smallest squared wave speed sampled at the element's degree-N_max
//! cubature points. A smoothing pass then guarantees that face neighbours
//! differ by at most one degree, which the trace projection requires.

use super::simplex::SimplexMesh;
use crate::error::{MrabError, Result};
use crate::operators::ReferenceTables;
use crate::operators::bernstein::barycentric;
use crate::parallel::HaloExchange;
use crate::types::ElementIndex;

/// Degree selection parameters.
#[derive(Clone, Debug)]
pub struct DegreeConfig {
    /// Target angular frequency ω
    pub omega: f64,
    /// Highest allowed degree
    pub n_max: usize,
    /// Sample the wave speed at cubature points (otherwise c² = 1)
    pub variable_wave_speed: bool,
}

impl Default for DegreeConfig {
    fn default() -> Self {
        Self {
            omega: 300.0,
            n_max: 5,
            variable_wave_speed: false,
        }
    }
}

impl DegreeConfig {
    /// Create config with the default target frequency.
    pub fn new(n_max: usize) -> Self {
        Self {
            n_max,
            ..Default::default()
        }
    }

    /// Set the target angular frequency.
    pub fn with_omega(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    /// Enable sampling of a spatially varying wave speed.
    pub fn with_variable_wave_speed(mut self, enabled: bool) -> Self {
        self.variable_wave_speed = enabled;
        self
    }
}

/// Global summary of an assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct DegreeReport {
    /// Largest degree over all partitions
    pub max_degree: usize,
    /// Element count per degree (index = degree)
    pub counts: Vec<usize>,
}

/// Assign and smooth degrees for every local element; halo entries are
/// filled by the exchange.
///
/// # Arguments
/// * `mesh` - Mesh with geometric factors
/// * `tables` - Reference tables (cubature at `n_max`)
/// * `config` - Frequency and degree cap
/// * `wave_speed2` - Squared wave speed at a physical point
/// * `halo` - Halo exchanger for neighbour degrees
pub fn assign_degrees<H: HaloExchange>(
    mesh: &SimplexMesh,
    tables: &ReferenceTables,
    config: &DegreeConfig,
    wave_speed2: impl Fn(&[f64; 3]) -> f64,
    halo: &mut H,
) -> Result<(Vec<usize>, DegreeReport)> {
    let n_max = config.n_max;
    tables.check_degree(n_max)?;

    let d = mesh.dim().n_dims();
    let cub_points: Vec<Vec<f64>> = tables
        .degree(n_max)
        .cubature
        .rule
        .points
        .iter()
        .map(|p| barycentric(&p[..d]))
        .collect();

    let mut degrees = vec![1; mesh.n_total()];
    for e in ElementIndex::iter(mesh.n_elements()) {
        let c2_min = if config.variable_wave_speed {
            cub_points
                .iter()
                .map(|lambda| wave_speed2(&mesh.map_barycentric(e, lambda)))
                .fold(f64::INFINITY, f64::min)
        } else {
            1.0
        };
        if !(c2_min.is_finite() && c2_min > 0.0) {
            return Err(MrabError::InvalidWaveSpeed {
                element: e.get(),
                c2: c2_min,
            });
        }

        let h = mesh.length_scale(e);
        let target = (0.5 * config.omega * h / c2_min.sqrt() - 1.0).ceil();
        degrees[e] = target.clamp(1.0, n_max as f64) as usize;
    }

    smooth_degrees(mesh, &mut degrees, n_max, halo);

    let mut counts = vec![0; n_max + 1];
    for &n in &degrees[..mesh.n_elements()] {
        counts[n] += 1;
    }
    for c in counts.iter_mut() {
        *c = halo.all_reduce_sum(*c);
    }
    let local_max = degrees[..mesh.n_elements()].iter().copied().max().unwrap_or(1);
    let max_degree = halo.all_reduce_max(local_max as f64) as usize;

    log::info!("Degree assignment: max degree N = {}", max_degree);
    for (n, &count) in counts.iter().enumerate().skip(1) {
        log::info!("  N = {}: {} elements", n, count);
    }

    Ok((degrees, DegreeReport { max_degree, counts }))
}

/// Raise degrees until face neighbours differ by at most one.
///
/// For p = N_max-2 down to 1, any element of degree <= p that touches a
/// neighbour of degree > p+1 is raised to p+1. Raising never lowers a
/// degree and never creates a violation at a threshold already processed.
pub fn smooth_degrees<H: HaloExchange>(
    mesh: &SimplexMesh,
    degrees: &mut [usize],
    n_max: usize,
    halo: &mut H,
) {
    let nf = mesh.dim().n_faces();
    for p in (1..n_max.saturating_sub(1)).rev() {
        halo.exchange_indices(degrees, 1);

        let raise: Vec<ElementIndex> = ElementIndex::iter(mesh.n_elements())
            .filter(|&e| degrees[e.get()] <= p)
            .filter(|&e| {
                (0..nf).any(|f| {
                    mesh.neighbor(e, f)
                        .is_some_and(|ep| degrees[ep.get()] > p + 1)
                })
            })
            .collect();

        for e in raise {
            degrees[e.get()] = p + 1;
        }
    }
    halo.exchange_indices(degrees, 1);
}
