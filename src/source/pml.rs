//! Perfectly matched layer damping profile.
//!
//! PML elements carry element type `k * 100` where the bits of `k` select
//! the damped axes (1 = x, 2 = y, 4 = z). Along an active axis the damping
//! grows quadratically from the edge of the interior box b to the outer
//! box B:
//!
//! σ_a(x) = σ_max (x_a - b_a)² / (B_a - b_a)²    for x_a outside [b_a⁻, b_a⁺]
//!
//! The interior box bounds all non-PML vertices and the outer box bounds
//! the whole mesh. Profiles are sampled at the cubature points of each PML
//! element's degree.

use crate::error::{MrabError, Result};
use crate::mesh::{MeshTopology, MrabLevels};
use crate::operators::ReferenceTables;
use crate::operators::bernstein::barycentric;
use crate::parallel::HaloExchange;
use crate::types::ElementIndex;

/// Damped axes of a PML element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PmlAxes(u8);

impl PmlAxes {
    /// Decode an element type; `None` for regular elements.
    pub fn from_element_type(code: i32) -> Option<Self> {
        if code < 100 || code % 100 != 0 {
            return None;
        }
        let mask = code / 100;
        (1..=7).contains(&mask).then_some(Self(mask as u8))
    }

    /// Element type code of this axis set.
    pub fn element_type(self) -> i32 {
        100 * self.0 as i32
    }

    /// Whether axis `a` (0 = x) is damped.
    #[inline]
    pub fn is_active(self, a: usize) -> bool {
        self.0 & (1 << a) != 0
    }
}

/// Damping strength.
#[derive(Clone, Debug)]
pub struct PmlConfig {
    /// Peak damping σ_max at the outer box
    pub xsigma: f64,
}

impl Default for PmlConfig {
    fn default() -> Self {
        Self { xsigma: 80.0 }
    }
}

impl PmlConfig {
    /// Create config with a peak damping.
    pub fn new(xsigma: f64) -> Self {
        Self { xsigma }
    }
}

/// Axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
}

impl BoundingBox {
    fn empty() -> Self {
        Self {
            lower: [f64::INFINITY; 3],
            upper: [f64::NEG_INFINITY; 3],
        }
    }

    fn include(&mut self, x: &[f64; 3]) {
        for k in 0..3 {
            self.lower[k] = self.lower[k].min(x[k]);
            self.upper[k] = self.upper[k].max(x[k]);
        }
    }

    fn reduce<H: HaloExchange>(&mut self, halo: &H) {
        for k in 0..3 {
            self.lower[k] = halo.all_reduce_min(self.lower[k]);
            self.upper[k] = halo.all_reduce_max(self.upper[k]);
        }
    }
}

/// σ at every cubature point of every PML element.
#[derive(Clone, Debug)]
pub struct PmlProfile {
    sigma: Vec<[f64; 3]>,
    n_cub_max: usize,
    interior: BoundingBox,
    outer: BoundingBox,
}

impl PmlProfile {
    /// Sample the damping profile for the PML elements of `levels`.
    ///
    /// # Arguments
    /// * `topo` - Mesh topology with element types and degrees
    /// * `tables` - Reference tables (per-degree cubature)
    /// * `levels` - Levels with PML elements already split out
    /// * `config` - Peak damping
    /// * `halo` - Halo exchanger for the global boxes
    pub fn build<H: HaloExchange>(
        topo: &MeshTopology,
        tables: &ReferenceTables,
        levels: &MrabLevels,
        config: &PmlConfig,
        halo: &H,
    ) -> Result<Self> {
        if !(config.xsigma.is_finite() && config.xsigma >= 0.0) {
            return Err(MrabError::InvalidConfig(format!(
                "PML xsigma must be non-negative, got {}",
                config.xsigma
            )));
        }
        let mesh = topo.mesh();
        let dim = topo.dim();
        let d = dim.n_dims();

        let mut interior = BoundingBox::empty();
        let mut outer = BoundingBox::empty();
        for e in ElementIndex::iter(topo.n_elements()) {
            let regular = PmlAxes::from_element_type(topo.element_type(e)).is_none();
            for v in 0..dim.n_verts() {
                let x = mesh.vertex(e, v);
                outer.include(&x);
                if regular {
                    interior.include(&x);
                }
            }
        }
        interior.reduce(halo);
        outer.reduce(halo);

        let n_cub_max = tables.n_cub_max();
        let mut sigma = vec![[0.0; 3]; levels.n_pml() * n_cub_max];
        for e in ElementIndex::iter(topo.n_elements()) {
            let Some(pml_id) = levels.pml_index(e) else {
                continue;
            };
            let Some(axes) = PmlAxes::from_element_type(topo.element_type(e)) else {
                continue;
            };
            let rule = &tables.degree(topo.degree(e)).cubature.rule;
            for (k, point) in rule.points.iter().enumerate() {
                let x = mesh.map_barycentric(e, &barycentric(&point[..d]));
                let s = &mut sigma[pml_id * n_cub_max + k];
                for a in (0..d).filter(|&a| axes.is_active(a)) {
                    s[a] = damping(config.xsigma, x[a], interior.lower[a], outer.lower[a])
                        + damping(config.xsigma, x[a], interior.upper[a], outer.upper[a]);
                }
            }
        }

        log::debug!(
            "PML: {} elements, interior box {:?} .. {:?}",
            levels.n_pml(),
            interior.lower,
            interior.upper
        );

        Ok(Self {
            sigma,
            n_cub_max,
            interior,
            outer,
        })
    }

    /// σ at cubature point `k` of PML element `pml_id`.
    #[inline]
    pub fn sigma(&self, pml_id: usize, k: usize) -> &[f64; 3] {
        &self.sigma[pml_id * self.n_cub_max + k]
    }

    /// All cubature samples of one PML element.
    #[inline]
    pub fn element(&self, pml_id: usize) -> &[[f64; 3]] {
        let start = pml_id * self.n_cub_max;
        &self.sigma[start..start + self.n_cub_max]
    }

    /// Bounding box of the regular elements.
    pub fn interior(&self) -> &BoundingBox {
        &self.interior
    }

    /// Bounding box of the whole mesh.
    pub fn outer(&self) -> &BoundingBox {
        &self.outer
    }
}

/// Quadratic ramp from the interior edge `b` towards the outer edge `outer`;
/// zero on the interior side of `b`.
fn damping(xsigma: f64, x: f64, b: f64, outer: f64) -> f64 {
    let width = outer - b;
    if width == 0.0 || (x - b) * width <= 0.0 {
        return 0.0;
    }
    xsigma * (x - b).powi(2) / (width * width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{LevelConfig, RectangleMesh};
    use crate::parallel::SerialHalo;
    use crate::types::Dimension;
    use approx::assert_relative_eq;

    #[test]
    fn test_axes_decoding() {
        assert_eq!(PmlAxes::from_element_type(0), None);
        assert_eq!(PmlAxes::from_element_type(150), None);
        let xy = PmlAxes::from_element_type(300).unwrap();
        assert!(xy.is_active(0) && xy.is_active(1) && !xy.is_active(2));
        let z = PmlAxes::from_element_type(400).unwrap();
        assert!(!z.is_active(0) && z.is_active(2));
        assert_eq!(z.element_type(), 400);
        assert_eq!(PmlAxes::from_element_type(800), None);
    }

    #[test]
    fn test_damping_ramp() {
        assert_eq!(damping(80.0, 0.5, 1.0, 2.0), 0.0);
        assert_relative_eq!(damping(80.0, 1.5, 1.0, 2.0), 20.0);
        assert_relative_eq!(damping(80.0, 2.0, 1.0, 2.0), 80.0);
        // lower side ramps towards smaller x
        assert_relative_eq!(damping(80.0, -1.5, -1.0, -2.0), 20.0);
        assert_eq!(damping(80.0, -0.5, -1.0, -2.0), 0.0);
        assert_eq!(damping(80.0, 3.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_profile_on_x_layer() {
        // four columns on [0, 4]; the rightmost column is an x PML
        let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
        let mut mesh = RectangleMesh::new(0.0, 4.0, 0.0, 1.0, 4, 1).build().unwrap();
        for e in ElementIndex::iter(mesh.n_elements()) {
            if mesh.centroid(e)[0] > 3.0 {
                mesh.set_element_type(e, 100);
            }
        }
        let n = mesh.n_total();
        let topo = MeshTopology::new(mesh, vec![2; n], &tables).unwrap();
        let mut levels = MrabLevels::build(
            topo.mesh(),
            &vec![1.0; topo.n_elements()],
            &LevelConfig::default(),
            &mut SerialHalo,
        )
        .unwrap();
        levels.split_pml(|e| topo.element_type(e) >= 100);
        assert_eq!(levels.n_pml(), 2);

        let profile =
            PmlProfile::build(&topo, &tables, &levels, &PmlConfig::default(), &SerialHalo)
                .unwrap();
        assert_eq!(profile.interior().upper[0], 3.0);
        assert_eq!(profile.outer().upper[0], 4.0);

        let rule = &tables.degree(2).cubature.rule;
        for e in ElementIndex::iter(topo.n_elements()) {
            let Some(id) = levels.pml_index(e) else {
                continue;
            };
            for (k, point) in rule.points.iter().enumerate() {
                let x = topo.mesh().map_barycentric(e, &barycentric(&point[..2]));
                let s = profile.sigma(id, k);
                assert_relative_eq!(s[0], 80.0 * (x[0] - 3.0).powi(2), epsilon = 1e-12);
                assert_eq!(s[1], 0.0);
            }
        }
    }
}
