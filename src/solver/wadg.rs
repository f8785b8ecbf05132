//! Weight-adjusted treatment of a variable wave speed.
//!
//! The mass matrix weighted by 1/c² is approximated by M^{-1}_{c²} ≈
//! M^{-1} M_{c²} M^{-1}, which turns the c² scaling of an RHS into
//!
//! rhs ← Project(c² · Interp(rhs))
//!
//! with c² sampled once at the cubature points of each element's degree.

use std::ops::Range;

use crate::error::{MrabError, Result};
use crate::mesh::MeshTopology;
use crate::operators::ReferenceTables;
use crate::operators::bernstein::barycentric;
use crate::types::ElementIndex;

/// c² at the cubature points of every local element.
#[derive(Clone, Debug)]
pub struct WaveSpeed {
    c2: Vec<f64>,
    n_cub_max: usize,
}

impl WaveSpeed {
    /// Sample `c2(x)` at the cubature points of each element's degree.
    ///
    /// Fails on a non-positive or non-finite sample.
    pub fn sample(
        topo: &MeshTopology,
        tables: &ReferenceTables,
        c2: impl Fn(&[f64; 3]) -> f64,
    ) -> Result<Self> {
        let d = topo.dim().n_dims();
        let n_cub_max = tables.n_cub_max();
        let mut values = vec![1.0; topo.n_elements() * n_cub_max];

        for e in ElementIndex::iter(topo.n_elements()) {
            let rule = &tables.degree(topo.degree(e)).cubature.rule;
            for (k, point) in rule.points.iter().enumerate() {
                let x = topo.mesh().map_barycentric(e, &barycentric(&point[..d]));
                let v = c2(&x);
                if !(v.is_finite() && v > 0.0) {
                    return Err(MrabError::InvalidWaveSpeed {
                        element: e.get(),
                        c2: v,
                    });
                }
                values[e.get() * n_cub_max + k] = v;
            }
        }

        Ok(Self {
            c2: values,
            n_cub_max,
        })
    }

    /// Samples of element `e`.
    #[inline]
    pub fn element(&self, e: ElementIndex) -> &[f64] {
        let start = e.get() * self.n_cub_max;
        &self.c2[start..start + self.n_cub_max]
    }

    /// Replace `fields` of an element block by Project(c² Interp(·)).
    ///
    /// # Arguments
    /// * `tables` - Reference tables
    /// * `topo` - Mesh topology (element degree)
    /// * `e` - Element whose samples are used
    /// * `block` - `np * n_fields` coefficients, modified in place
    /// * `n_fields` - Interleaved fields in `block`
    /// * `fields` - Fields to scale
    pub fn apply(
        &self,
        tables: &ReferenceTables,
        topo: &MeshTopology,
        e: ElementIndex,
        block: &mut [f64],
        n_fields: usize,
        fields: Range<usize>,
    ) {
        let ops = tables.degree(topo.degree(e));
        let cub = &ops.cubature;
        let c2 = self.element(e);

        let mut coeffs = vec![0.0; ops.np];
        let mut values = vec![0.0; cub.n_cub()];
        for fld in fields {
            for (i, c) in coeffs.iter_mut().enumerate() {
                *c = block[i * n_fields + fld];
            }
            cub.interpolate(&coeffs, &mut values, 1);
            for (v, &s) in values.iter_mut().zip(c2) {
                *v *= s;
            }
            cub.project(&values, &mut coeffs, 1);
            for (i, &c) in coeffs.iter().enumerate() {
                block[i * n_fields + fld] = c;
            }
        }
    }
}
