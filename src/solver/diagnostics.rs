//! Runtime diagnostics for an external monitor.
//!
//! Norms are integrated with each element's cubature rule over the local
//! elements only; combine them across ranks with the halo reductions.

use super::state::SolverState;
use crate::mesh::MeshTopology;
use crate::operators::ReferenceTables;
use crate::parallel::HaloExchange;
use crate::types::ElementIndex;

/// Per-field L2 norm and maximum of |q| at the cubature points.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldNorms {
    /// sqrt(∫ q_fld²) over the local elements
    pub l2: Vec<f64>,
    /// max |q_fld| at the cubature points
    pub max_abs: Vec<f64>,
}

impl FieldNorms {
    /// Integrate the field norms of a state.
    ///
    /// # Arguments
    /// * `topo` - Mesh topology (degrees, Jacobians)
    /// * `tables` - Reference tables (cubature rules)
    /// * `state` - Solver state
    pub fn compute(topo: &MeshTopology, tables: &ReferenceTables, state: &SolverState) -> Self {
        let nf = state.n_fields();
        let mut sum_sq = vec![0.0; nf];
        let mut max_abs = vec![0.0_f64; nf];
        let mut values = vec![0.0; tables.n_cub_max() * nf];

        for e in ElementIndex::iter(topo.n_elements()) {
            let ops = tables.degree(topo.degree(e));
            let cub = &ops.cubature;
            let n_cub = cub.n_cub();
            let j = topo.volume(e).j;
            cub.interpolate(
                &state.element(e)[..ops.np * nf],
                &mut values[..n_cub * nf],
                nf,
            );
            for (k, &w) in cub.rule.weights.iter().enumerate() {
                for fld in 0..nf {
                    let v = values[k * nf + fld];
                    sum_sq[fld] += j * w * v * v;
                    max_abs[fld] = max_abs[fld].max(v.abs());
                }
            }
        }

        Self {
            l2: sum_sq.into_iter().map(f64::sqrt).collect(),
            max_abs,
        }
    }

    /// Global maximum over ranks. L2 norms stay local.
    pub fn reduce_max<H: HaloExchange>(mut self, halo: &H) -> Self {
        for m in &mut self.max_abs {
            *m = halo.all_reduce_max(*m);
        }
        self
    }

    /// ½ Σ_fld ‖q_fld‖², the acoustic energy for unit density and speed.
    pub fn energy(&self) -> f64 {
        0.5 * self.l2.iter().map(|v| v * v).sum::<f64>()
    }

    /// Whether every norm is finite.
    pub fn is_finite(&self) -> bool {
        self.l2.iter().chain(&self.max_abs).all(|v| v.is_finite())
    }

    /// One-line summary, e.g. `u: 1.2e-3 (max 4.0e-2), ...`.
    pub fn summary_line(&self, names: &[&str]) -> String {
        self.l2
            .iter()
            .zip(&self.max_abs)
            .enumerate()
            .map(|(fld, (l2, max))| {
                let name = names.get(fld).copied().unwrap_or("?");
                format!("{}: {:.3e} (max {:.3e})", name, l2, max)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// First local coefficient that is NaN or infinite, as `(element, field)`.
pub fn first_non_finite(state: &SolverState) -> Option<(ElementIndex, usize)> {
    let nf = state.n_fields();
    let stride = state.volume_stride();
    state
        .q()
        .iter()
        .position(|v| !v.is_finite())
        .map(|idx| (ElementIndex::new(idx / stride), idx % nf))
}
