//! Degree-aware mesh topology consumed by the kernels.
//!
//! [`MeshTopology`] combines a [`SimplexMesh`] with the per-element degree
//! and the face-node maps. It is immutable once built.
//!
//! Flat layouts (all with `NpMax`/`NfpMax` strides so every element has a
//! fixed-size slot):
//!
//! - volume node `(e, i)` → `e * np_max + i`
//! - trace node `(e, f, n)` → `(e * n_faces + f) * nfp_max + n`
//!
//! `vmap_m` gives the element-local volume node of each owned face node and
//! `map_p` the trace node at which the neighbour stores the matching node of
//! the trace it projected to this element's degree.

use super::boundary_codes::BoundaryCode;
use super::simplex::{SimplexMesh, SurfaceGeometry, VolumeGeometry};
use crate::error::{MrabError, Result};
use crate::operators::{BernsteinBasis, ReferenceTables};
use crate::types::{Dimension, ElementIndex};

/// Mesh connectivity, geometry, degrees and face-node maps.
#[derive(Clone, Debug)]
pub struct MeshTopology {
    mesh: SimplexMesh,
    degrees: Vec<usize>,
    np_max: usize,
    nfp_max: usize,
    vmap_m: Vec<usize>,
    map_p: Vec<Option<usize>>,
    nodes: Vec<[f64; 3]>,
}

impl MeshTopology {
    /// Attach degrees (locals and halo) to a mesh and build the face maps.
    pub fn new(mesh: SimplexMesh, degrees: Vec<usize>, tables: &ReferenceTables) -> Result<Self> {
        if tables.dim() != mesh.dim() {
            return Err(MrabError::dimension_mismatch(
                format!("{:?} tables", mesh.dim()),
                format!("{:?}", tables.dim()),
            ));
        }
        if degrees.len() != mesh.n_total() {
            return Err(MrabError::dimension_mismatch(
                format!("{} degrees", mesh.n_total()),
                degrees.len().to_string(),
            ));
        }
        for &n in &degrees {
            tables.check_degree(n)?;
        }

        let dim = mesh.dim();
        let np_max = tables.np_max();
        let nfp_max = tables.nfp_max();
        let nf = dim.n_faces();
        let n_total = mesh.n_total();

        let mut nodes = vec![[0.0; 3]; n_total * np_max];
        for e in ElementIndex::iter(n_total) {
            let ops = tables.degree(degrees[e]);
            for (i, lambda) in ops.domain_points.iter().enumerate() {
                nodes[e.get() * np_max + i] = mesh.map_barycentric(e, lambda);
            }
        }

        let mut vmap_m = vec![0; n_total * nf * nfp_max];
        for e in ElementIndex::iter(n_total) {
            let ops = tables.degree(degrees[e]);
            for (f, face) in ops.face_nodes.iter().enumerate() {
                for (n, &vol) in face.iter().enumerate() {
                    vmap_m[(e.get() * nf + f) * nfp_max + n] = vol;
                }
            }
        }

        let mut topo = Self {
            mesh,
            degrees,
            np_max,
            nfp_max,
            vmap_m,
            map_p: vec![None; n_total * nf * nfp_max],
            nodes,
        };
        topo.build_map_p();
        Ok(topo)
    }

    /// Match each local face node against the neighbour's face lattice at
    /// this element's degree.
    ///
    /// Positions are compared relative to the face centroids so periodic
    /// face pairs match as well as conforming ones.
    fn build_map_p(&mut self) {
        let dim = self.dim();
        let nf = dim.n_faces();
        let d = dim.n_dims();

        for e in ElementIndex::iter(self.mesh.n_elements()) {
            let n = self.degrees[e];
            let face_basis = BernsteinBasis::new(d - 1, n);
            for f in 0..nf {
                let Some(ep) = self.mesh.neighbor(e, f) else {
                    continue;
                };
                let fp = self.mesh.neighbor_face(e, f);

                let own = self.face_lattice(e, f, &face_basis);
                let other = self.face_lattice(ep, fp, &face_basis);
                let tol = 1e-8 * self.mesh.length_scale(e).max(f64::MIN_POSITIVE);

                for (i, xi) in own.iter().enumerate() {
                    let hit = other.iter().position(|xj| {
                        (0..3).map(|k| (xi[k] - xj[k]).powi(2)).sum::<f64>().sqrt() < tol
                    });
                    self.map_p[(e.get() * nf + f) * self.nfp_max + i] =
                        hit.map(|m| (ep.get() * nf + fp) * self.nfp_max + m);
                }
            }
        }
    }

    /// Face domain points of `(e, f)` at the basis degree, centred on the
    /// face centroid.
    fn face_lattice(&self, e: ElementIndex, f: usize, basis: &BernsteinBasis) -> Vec<[f64; 3]> {
        let verts: Vec<[f64; 3]> = self
            .dim()
            .face_vertices(f)
            .iter()
            .map(|&v| self.mesh.vertex(e, v))
            .collect();
        let mut centroid = [0.0; 3];
        for v in &verts {
            for k in 0..3 {
                centroid[k] += v[k] / verts.len() as f64;
            }
        }

        (0..basis.len())
            .map(|m| {
                let lambda = basis.domain_point(m);
                let mut x = [0.0; 3];
                for (l, v) in lambda.iter().zip(&verts) {
                    for k in 0..3 {
                        x[k] += l * v[k];
                    }
                }
                [x[0] - centroid[0], x[1] - centroid[1], x[2] - centroid[2]]
            })
            .collect()
    }

    /// Underlying simplex mesh.
    pub fn mesh(&self) -> &SimplexMesh {
        &self.mesh
    }

    /// Spatial dimension.
    #[inline]
    pub fn dim(&self) -> Dimension {
        self.mesh.dim()
    }

    /// Number of local elements.
    #[inline]
    pub fn n_elements(&self) -> usize {
        self.mesh.n_elements()
    }

    /// Local plus halo elements.
    #[inline]
    pub fn n_total(&self) -> usize {
        self.mesh.n_total()
    }

    /// Faces per element.
    #[inline]
    pub fn n_faces(&self) -> usize {
        self.dim().n_faces()
    }

    /// Volume node stride.
    #[inline]
    pub fn np_max(&self) -> usize {
        self.np_max
    }

    /// Face node stride.
    #[inline]
    pub fn nfp_max(&self) -> usize {
        self.nfp_max
    }

    /// Polynomial degree of `e`.
    #[inline]
    pub fn degree(&self, e: ElementIndex) -> usize {
        self.degrees[e]
    }

    /// All degrees, locals then halo.
    pub fn degrees(&self) -> &[usize] {
        &self.degrees
    }

    /// Volume nodes of `e`.
    #[inline]
    pub fn np(&self, e: ElementIndex) -> usize {
        self.dim().np(self.degrees[e])
    }

    /// Face nodes of `e`.
    #[inline]
    pub fn nfp(&self, e: ElementIndex) -> usize {
        self.dim().nfp(self.degrees[e])
    }

    /// Degree seen across face `f`; the owner itself on a boundary.
    #[inline]
    pub fn neighbor_degree(&self, e: ElementIndex, f: usize) -> usize {
        let ep = self.mesh.neighbor(e, f).unwrap_or(e);
        self.degrees[ep]
    }

    /// Face neighbour.
    #[inline]
    pub fn neighbor(&self, e: ElementIndex, f: usize) -> Option<ElementIndex> {
        self.mesh.neighbor(e, f)
    }

    /// Boundary code of a face.
    #[inline]
    pub fn boundary(&self, e: ElementIndex, f: usize) -> BoundaryCode {
        self.mesh.boundary(e, f)
    }

    /// Surface geometric factors.
    #[inline]
    pub fn surface(&self, e: ElementIndex, f: usize) -> &SurfaceGeometry {
        self.mesh.surface(e, f)
    }

    /// Volume geometric factors.
    #[inline]
    pub fn volume(&self, e: ElementIndex) -> &VolumeGeometry {
        self.mesh.volume(e)
    }

    /// Element type code.
    #[inline]
    pub fn element_type(&self, e: ElementIndex) -> i32 {
        self.mesh.element_type(e)
    }

    /// Flat trace node index of `(e, f, n)`.
    #[inline]
    pub fn trace_node(&self, e: ElementIndex, f: usize, n: usize) -> usize {
        debug_assert!(f < self.n_faces() && n < self.nfp_max);
        (e.get() * self.n_faces() + f) * self.nfp_max + n
    }

    /// Element-local volume node under face node `(e, f, n)`.
    #[inline]
    pub fn vmap_m(&self, e: ElementIndex, f: usize, n: usize) -> usize {
        self.vmap_m[self.trace_node(e, f, n)]
    }

    /// Neighbour trace node matching `(e, f, n)`, `None` on boundaries or
    /// unmatched nodes.
    #[inline]
    pub fn map_p(&self, e: ElementIndex, f: usize, n: usize) -> Option<usize> {
        self.map_p[self.trace_node(e, f, n)]
    }

    /// Physical position of volume node `i` of `e`.
    #[inline]
    pub fn node(&self, e: ElementIndex, i: usize) -> [f64; 3] {
        self.nodes[e.get() * self.np_max + i]
    }

    /// Physical position of face node `(e, f, n)`.
    #[inline]
    pub fn face_node(&self, e: ElementIndex, f: usize, n: usize) -> [f64; 3] {
        self.node(e, self.vmap_m(e, f, n))
    }
}
