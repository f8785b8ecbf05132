//! Scattered-field source injection patch.
//!
//! Elements with a vertex within `patch_size` of the source form the patch.
//! Faces on the patch boundary are flagged on both sides:
//!
//! - `-10` on the patch element: its trace gains +incident before it is
//!   handed to the neighbour,
//! - `-11` on the outside element: its trace loses the incident field.
//!
//! Faces on the domain boundary keep their physical code.

use super::ricker::PointSource;
use crate::error::{MrabError, Result};
use crate::mesh::{BoundaryCode, MeshTopology, SimplexMesh};
use crate::operators::ReferenceTables;
use crate::operators::bernstein::barycentric;
use crate::parallel::HaloExchange;
use crate::physics::SourceFields;
use crate::types::ElementIndex;

/// Point-source and patch parameters.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Source position
    pub position: [f64; 3],
    /// Radius around the source that selects patch elements
    pub patch_size: f64,
    /// Ricker centre frequency
    pub frequency: f64,
    /// Time shift of the pulse
    pub t0: f64,
    /// Take the reference c² from the wave speed field (otherwise 1)
    pub variable_wave_speed: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.35, 0.0],
            patch_size: 0.1,
            frequency: 4.0,
            t0: -0.1,
            variable_wave_speed: false,
        }
    }
}

impl SourceConfig {
    /// Create config for a source at `position`.
    pub fn new(position: [f64; 3]) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Set the patch radius.
    pub fn with_patch_size(mut self, patch_size: f64) -> Self {
        self.patch_size = patch_size;
        self
    }

    /// Set the Ricker centre frequency.
    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    /// Set the pulse time shift.
    pub fn with_t0(mut self, t0: f64) -> Self {
        self.t0 = t0;
        self
    }

    /// Sample the reference wave speed from the medium.
    pub fn with_variable_wave_speed(mut self, enabled: bool) -> Self {
        self.variable_wave_speed = enabled;
        self
    }
}

/// Source patch: the point source and the elements solving for the
/// scattered field.
#[derive(Clone, Debug)]
pub struct SourcePatch {
    source: PointSource,
    elements: Vec<ElementIndex>,
    n_interfaces: usize,
}

impl SourcePatch {
    /// Flag the patch and its interface faces on `mesh`.
    ///
    /// # Arguments
    /// * `mesh` - Mesh whose boundary codes receive `-10` / `-11`
    /// * `tables` - Reference tables (cubature at `n_max` samples c²)
    /// * `config` - Source parameters
    /// * `wave_speed2` - Squared wave speed at a physical point
    /// * `halo` - Halo exchanger for the patch flags
    pub fn setup<H: HaloExchange>(
        mesh: &mut SimplexMesh,
        tables: &ReferenceTables,
        config: &SourceConfig,
        wave_speed2: impl Fn(&[f64; 3]) -> f64,
        halo: &mut H,
    ) -> Result<Self> {
        if !(config.patch_size > 0.0) {
            return Err(MrabError::InvalidConfig(format!(
                "source patch size must be positive, got {}",
                config.patch_size
            )));
        }
        if !(config.frequency > 0.0) {
            return Err(MrabError::InvalidConfig(format!(
                "source frequency must be positive, got {}",
                config.frequency
            )));
        }

        let d = mesh.dim().n_dims();
        let nv = mesh.dim().n_verts();
        let x0 = config.position;
        let dist = |x: &[f64; 3]| (0..d).map(|k| (x[k] - x0[k]).powi(2)).sum::<f64>().sqrt();

        let mut flag = vec![0usize; mesh.n_total()];
        let mut elements = Vec::new();
        for e in ElementIndex::iter(mesh.n_elements()) {
            if (0..nv).any(|v| dist(&mesh.vertex(e, v)) <= config.patch_size) {
                flag[e] = 1;
                elements.push(e);
            }
        }
        halo.exchange_indices(&mut flag, 1);

        // reference c² at the patch cubature node closest to the source
        let mut c2 = 1.0;
        if config.variable_wave_speed {
            let points: Vec<Vec<f64>> = tables
                .degree(tables.n_max())
                .cubature
                .rule
                .points
                .iter()
                .map(|p| barycentric(&p[..d]))
                .collect();
            let mut closest = f64::INFINITY;
            for &e in &elements {
                for lambda in &points {
                    let x = mesh.map_barycentric(e, lambda);
                    let r = dist(&x);
                    if r < closest {
                        closest = r;
                        c2 = wave_speed2(&x);
                    }
                }
            }
        }
        if !(c2.is_finite() && c2 > 0.0) {
            return Err(MrabError::InvalidWaveSpeed {
                element: elements.first().map(|e| e.get()).unwrap_or(0),
                c2,
            });
        }

        let mut n_interfaces = 0;
        for e in ElementIndex::iter(mesh.n_elements()) {
            for f in 0..mesh.dim().n_faces() {
                let Some(ep) = mesh.neighbor(e, f) else {
                    continue;
                };
                match (flag[e], flag[ep]) {
                    (1, 0) => {
                        mesh.set_boundary(e, f, BoundaryCode::SourceInterior);
                        n_interfaces += 1;
                    }
                    (0, 1) => {
                        mesh.set_boundary(e, f, BoundaryCode::SourceExterior);
                        n_interfaces += 1;
                    }
                    _ => {}
                }
            }
        }

        let total = halo.all_reduce_sum(elements.len());
        log::info!(
            "Source: found {} elements inside source injection patch, c2 = {}",
            total,
            c2
        );

        Ok(Self {
            source: PointSource::new(x0, config.frequency, config.t0).with_wave_speed(c2.sqrt()),
            elements,
            n_interfaces,
        })
    }

    /// Patch from an explicit source and element list; boundary codes are
    /// expected on the mesh already.
    pub fn from_parts(source: PointSource, elements: Vec<ElementIndex>) -> Self {
        Self {
            source,
            elements,
            n_interfaces: 0,
        }
    }

    /// Add the incident field of face `(e, f)` at time `t` to a trace,
    /// with the sign of the face's source code. Other faces are untouched.
    ///
    /// # Arguments
    /// * `trace` - `Nfp * n_fields` Bernstein coefficients of the face
    #[allow(clippy::too_many_arguments)]
    pub fn add_incident_trace(
        &self,
        topo: &MeshTopology,
        tables: &ReferenceTables,
        fields: &SourceFields,
        e: ElementIndex,
        f: usize,
        t: f64,
        n_fields: usize,
        trace: &mut [f64],
    ) {
        let Some(sign) = topo.boundary(e, f).source_sign() else {
            return;
        };
        let ops = tables.degree(topo.degree(e));
        let mut nodal = vec![0.0; ops.nfp * n_fields];
        for (n, values) in nodal.chunks_exact_mut(n_fields).enumerate() {
            self.source
                .incident(&topo.face_node(e, f, n), t, fields, values);
        }
        let mut bb = vec![0.0; ops.nfp * n_fields];
        ops.face_vandermonde.nodal_to_bb(&nodal, &mut bb, n_fields);
        for (dst, inc) in trace.iter_mut().zip(&bb) {
            *dst += sign * inc;
        }
    }

    /// The point source.
    pub fn source(&self) -> &PointSource {
        &self.source
    }

    /// Local elements inside the patch.
    pub fn elements(&self) -> &[ElementIndex] {
        &self.elements
    }

    /// Number of local faces flagged during setup.
    pub fn n_interfaces(&self) -> usize {
        self.n_interfaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::RectangleMesh;
    use crate::parallel::SerialHalo;
    use crate::types::Dimension;

    fn setup(config: &SourceConfig) -> (SimplexMesh, SourcePatch) {
        let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
        let mut mesh = RectangleMesh::new(-1.0, 1.0, -1.0, 1.0, 8, 8).build().unwrap();
        let patch =
            SourcePatch::setup(&mut mesh, &tables, config, |_| 1.0, &mut SerialHalo).unwrap();
        (mesh, patch)
    }

    #[test]
    fn test_patch_faces_are_flagged_in_pairs() {
        let config = SourceConfig::new([0.0, 0.0, 0.0]).with_patch_size(0.3);
        let (mesh, patch) = setup(&config);
        assert!(!patch.elements().is_empty());
        assert!(patch.n_interfaces() > 0);

        for e in ElementIndex::iter(mesh.n_elements()) {
            for f in 0..3 {
                let code = mesh.boundary(e, f);
                if let Some(sign) = code.source_sign() {
                    let ep = mesh.neighbor(e, f).unwrap();
                    let fp = mesh.neighbor_face(e, f);
                    let other = mesh.boundary(ep, fp).source_sign().unwrap();
                    assert_eq!(sign, -other);
                    assert_eq!(sign > 0.0, patch.elements().contains(&e));
                }
            }
        }
    }

    #[test]
    fn test_domain_boundary_keeps_physical_code() {
        // patch touching the lower-left corner
        let config = SourceConfig::new([-1.0, -1.0, 0.0]).with_patch_size(0.3);
        let (mesh, patch) = setup(&config);
        for &e in patch.elements() {
            for f in 0..3 {
                if mesh.neighbor(e, f).is_none() {
                    assert_eq!(mesh.boundary(e, f), BoundaryCode::WALL);
                }
            }
        }
    }

    #[test]
    fn test_reference_speed_from_medium() {
        let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
        let mut mesh = RectangleMesh::new(-1.0, 1.0, -1.0, 1.0, 4, 4).build().unwrap();
        let config = SourceConfig::new([0.0, 0.0, 0.0])
            .with_patch_size(0.2)
            .with_variable_wave_speed(true);
        let patch =
            SourcePatch::setup(&mut mesh, &tables, &config, |_| 4.0, &mut SerialHalo).unwrap();
        assert_eq!(patch.source().c, 2.0);
    }

    #[test]
    fn test_invalid_patch_size() {
        let tables = ReferenceTables::new(Dimension::Two, 2).unwrap();
        let mut mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 1, 1).build().unwrap();
        let config = SourceConfig::default().with_patch_size(0.0);
        assert!(
            SourcePatch::setup(&mut mesh, &tables, &config, |_| 1.0, &mut SerialHalo).is_err()
        );
    }
}
