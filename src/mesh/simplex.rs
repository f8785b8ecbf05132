//! Unstructured simplex mesh: vertices, connectivity and affine geometry.
//!
//! Elements `[0, n_elements)` are owned by this rank; halo copies of
//! neighbouring ranks' elements follow at `[n_elements, n_total)`.
//!
//! Every element is affine, so the geometric factors are constant per
//! element (volume) and per element face (surface).

use std::collections::HashMap;

use super::boundary_codes::BoundaryCode;
use crate::error::{MrabError, Result};
use crate::types::{Dimension, ElementIndex};

/// Per-face geometric factors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceGeometry {
    /// Outward unit normal (z = 0 in 2D)
    pub normal: [f64; 3],
    /// Face Jacobian relative to a reference face of measure 2
    pub sj: f64,
    /// Inverse volume Jacobian of the owning element
    pub inv_j: f64,
}

impl SurfaceGeometry {
    /// Length scale 0.5 / (sJ invJ) used for degree selection.
    #[inline]
    pub fn length_scale(&self) -> f64 {
        0.5 / (self.sj * self.inv_j)
    }

    /// Lift scaling sJ * invJ.
    #[inline]
    pub fn lift_scale(&self) -> f64 {
        self.sj * self.inv_j
    }
}

/// Per-element geometric factors.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VolumeGeometry {
    /// Volume Jacobian relative to the reference element
    pub j: f64,
    /// Rows ∇r, ∇s, ∇t of the inverse mapping
    pub metric: [[f64; 3]; 3],
}

/// Conforming simplex mesh with face connectivity.
#[derive(Clone, Debug)]
pub struct SimplexMesh {
    dim: Dimension,
    n_elements: usize,
    n_total: usize,
    vertices: Vec<[f64; 3]>,
    e_to_v: Vec<usize>,
    e_to_e: Vec<Option<ElementIndex>>,
    e_to_f: Vec<usize>,
    e_to_b: Vec<BoundaryCode>,
    element_type: Vec<i32>,
    sgeo: Vec<SurfaceGeometry>,
    vgeo: Vec<VolumeGeometry>,
}

impl SimplexMesh {
    /// Build a mesh from vertices and element-to-vertex connectivity.
    ///
    /// Faces shared by two elements are connected; all others become
    /// [`BoundaryCode::WALL`]. Element orientation is normalised so every
    /// Jacobian is positive.
    ///
    /// # Arguments
    /// * `dim` - Triangles or tetrahedra
    /// * `vertices` - Vertex coordinates (z ignored in 2D)
    /// * `e_to_v` - `n_verts` vertex ids per element, locals first
    /// * `n_elements` - Number of local elements; the rest are halo copies
    pub fn new(
        dim: Dimension,
        vertices: Vec<[f64; 3]>,
        mut e_to_v: Vec<usize>,
        n_elements: usize,
    ) -> Result<Self> {
        let nv = dim.n_verts();
        let nf = dim.n_faces();
        if e_to_v.len() % nv != 0 {
            return Err(MrabError::InvalidConnectivity(format!(
                "{} vertex ids is not a multiple of {}",
                e_to_v.len(),
                nv
            )));
        }
        let n_total = e_to_v.len() / nv;
        if n_elements == 0 {
            return Err(MrabError::EmptyMesh);
        }
        if n_elements > n_total {
            return Err(MrabError::dimension_mismatch(
                format!("<= {} local elements", n_total),
                n_elements.to_string(),
            ));
        }
        if let Some(&bad) = e_to_v.iter().find(|&&v| v >= vertices.len()) {
            return Err(MrabError::InvalidConnectivity(format!(
                "vertex id {} out of range ({} vertices)",
                bad,
                vertices.len()
            )));
        }

        let mut vgeo = Vec::with_capacity(n_total);
        for e in 0..n_total {
            let mut geo = volume_geometry(dim, &vertices, &e_to_v[e * nv..(e + 1) * nv]);
            if geo.j < 0.0 {
                e_to_v.swap(e * nv + 1, e * nv + 2);
                geo = volume_geometry(dim, &vertices, &e_to_v[e * nv..(e + 1) * nv]);
            }
            if geo.j.abs() < f64::MIN_POSITIVE {
                return Err(MrabError::InvalidConnectivity(format!(
                    "element {} is degenerate",
                    e
                )));
            }
            vgeo.push(geo);
        }

        let mut sgeo = Vec::with_capacity(n_total * nf);
        for geo in &vgeo {
            for f in 0..nf {
                sgeo.push(surface_geometry(dim, geo, f));
            }
        }

        let mut mesh = Self {
            dim,
            n_elements,
            n_total,
            vertices,
            e_to_v,
            e_to_e: vec![None; n_total * nf],
            e_to_f: (0..n_total * nf).map(|i| i % nf).collect(),
            e_to_b: vec![BoundaryCode::WALL; n_total * nf],
            element_type: vec![0; n_total],
            sgeo,
            vgeo,
        };
        mesh.connect_shared_faces();
        Ok(mesh)
    }

    fn connect_shared_faces(&mut self) {
        let nf = self.dim.n_faces();
        let mut open: HashMap<Vec<usize>, (usize, usize)> = HashMap::new();
        for e in 0..self.n_total {
            for f in 0..nf {
                let key = self.face_key(e, f);
                match open.remove(&key) {
                    Some((ep, fp)) => {
                        self.link(e, f, ep, fp);
                    }
                    None => {
                        open.insert(key, (e, f));
                    }
                }
            }
        }
    }

    fn face_key(&self, e: usize, f: usize) -> Vec<usize> {
        let nv = self.dim.n_verts();
        let mut key: Vec<usize> = self
            .dim
            .face_vertices(f)
            .iter()
            .map(|&v| self.e_to_v[e * nv + v])
            .collect();
        key.sort_unstable();
        key
    }

    fn link(&mut self, e: usize, f: usize, ep: usize, fp: usize) {
        let nf = self.dim.n_faces();
        self.e_to_e[e * nf + f] = Some(ElementIndex::new(ep));
        self.e_to_f[e * nf + f] = fp;
        self.e_to_b[e * nf + f] = BoundaryCode::Interior;
        self.e_to_e[ep * nf + fp] = Some(ElementIndex::new(e));
        self.e_to_f[ep * nf + fp] = f;
        self.e_to_b[ep * nf + fp] = BoundaryCode::Interior;
    }

    /// Connect two faces that do not share vertex ids (periodic pairs).
    pub fn connect_faces(&mut self, a: (ElementIndex, usize), b: (ElementIndex, usize)) {
        self.link(a.0.get(), a.1, b.0.get(), b.1);
    }

    /// Spatial dimension.
    pub fn dim(&self) -> Dimension {
        self.dim
    }

    /// Number of local elements.
    pub fn n_elements(&self) -> usize {
        self.n_elements
    }

    /// Number of halo elements.
    pub fn n_halo(&self) -> usize {
        self.n_total - self.n_elements
    }

    /// Local plus halo elements.
    pub fn n_total(&self) -> usize {
        self.n_total
    }

    /// All vertex coordinates.
    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    /// Vertex ids of element `e`.
    pub fn element_vertices(&self, e: ElementIndex) -> &[usize] {
        let nv = self.dim.n_verts();
        &self.e_to_v[e.get() * nv..(e.get() + 1) * nv]
    }

    /// Coordinates of local vertex `v` of element `e`.
    pub fn vertex(&self, e: ElementIndex, v: usize) -> [f64; 3] {
        self.vertices[self.element_vertices(e)[v]]
    }

    /// Vertex average of element `e`.
    pub fn centroid(&self, e: ElementIndex) -> [f64; 3] {
        let ids = self.element_vertices(e);
        let mut c = [0.0; 3];
        for &v in ids {
            for (ci, xi) in c.iter_mut().zip(self.vertices[v]) {
                *ci += xi;
            }
        }
        c.map(|x| x / ids.len() as f64)
    }

    /// Physical position of barycentric point `lambda` in element `e`.
    pub fn map_barycentric(&self, e: ElementIndex, lambda: &[f64]) -> [f64; 3] {
        let mut x = [0.0; 3];
        for (&v, &l) in self.element_vertices(e).iter().zip(lambda) {
            for (xi, vi) in x.iter_mut().zip(self.vertices[v]) {
                *xi += l * vi;
            }
        }
        x
    }

    /// Face neighbour, `None` on a domain boundary.
    #[inline]
    pub fn neighbor(&self, e: ElementIndex, f: usize) -> Option<ElementIndex> {
        self.e_to_e[e.get() * self.dim.n_faces() + f]
    }

    /// Neighbour's local face matching face `f` of `e`.
    #[inline]
    pub fn neighbor_face(&self, e: ElementIndex, f: usize) -> usize {
        self.e_to_f[e.get() * self.dim.n_faces() + f]
    }

    /// Boundary code of face `f` of `e`.
    #[inline]
    pub fn boundary(&self, e: ElementIndex, f: usize) -> BoundaryCode {
        self.e_to_b[e.get() * self.dim.n_faces() + f]
    }

    /// Override a face's boundary code.
    pub fn set_boundary(&mut self, e: ElementIndex, f: usize, code: BoundaryCode) {
        let nf = self.dim.n_faces();
        self.e_to_b[e.get() * nf + f] = code;
    }

    /// Element type code (0 regular, k*100 PML).
    #[inline]
    pub fn element_type(&self, e: ElementIndex) -> i32 {
        self.element_type[e.get()]
    }

    /// Set an element type code.
    pub fn set_element_type(&mut self, e: ElementIndex, code: i32) {
        self.element_type[e.get()] = code;
    }

    /// Surface factors of face `f` of `e`.
    #[inline]
    pub fn surface(&self, e: ElementIndex, f: usize) -> &SurfaceGeometry {
        &self.sgeo[e.get() * self.dim.n_faces() + f]
    }

    /// Volume factors of `e`.
    #[inline]
    pub fn volume(&self, e: ElementIndex) -> &VolumeGeometry {
        &self.vgeo[e.get()]
    }

    /// Worst-face length scale max_f 0.5/(sJ invJ).
    pub fn length_scale(&self, e: ElementIndex) -> f64 {
        (0..self.dim.n_faces())
            .map(|f| self.surface(e, f).length_scale())
            .fold(0.0, f64::max)
    }

    /// Largest local length scale.
    pub fn h_max(&self) -> f64 {
        ElementIndex::iter(self.n_elements)
            .map(|e| self.length_scale(e))
            .fold(0.0, f64::max)
    }
}

fn volume_geometry(dim: Dimension, vertices: &[[f64; 3]], ids: &[usize]) -> VolumeGeometry {
    let v0 = vertices[ids[0]];
    let col = |k: usize| -> [f64; 3] {
        let vk = vertices[ids[k]];
        [
            0.5 * (vk[0] - v0[0]),
            0.5 * (vk[1] - v0[1]),
            0.5 * (vk[2] - v0[2]),
        ]
    };

    match dim {
        Dimension::Two => {
            let (xr, yr) = (col(1)[0], col(1)[1]);
            let (xs, ys) = (col(2)[0], col(2)[1]);
            let j = xr * ys - xs * yr;
            VolumeGeometry {
                j,
                metric: [
                    [ys / j, -xs / j, 0.0],
                    [-yr / j, xr / j, 0.0],
                    [0.0, 0.0, 0.0],
                ],
            }
        }
        Dimension::Three => {
            // a[i][k] = ∂x_i/∂r_k
            let (cr, cs, ct) = (col(1), col(2), col(3));
            let a = [
                [cr[0], cs[0], ct[0]],
                [cr[1], cs[1], ct[1]],
                [cr[2], cs[2], ct[2]],
            ];
            let j = a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1])
                - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
                + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0]);
            let mut metric = [[0.0; 3]; 3];
            for (k, row) in metric.iter_mut().enumerate() {
                for (i, m) in row.iter_mut().enumerate() {
                    // inverse(a)[k][i] = cofactor(a)[i][k] / det
                    let (r0, r1) = ((i + 1) % 3, (i + 2) % 3);
                    let (c0, c1) = ((k + 1) % 3, (k + 2) % 3);
                    *m = (a[r0][c0] * a[r1][c1] - a[r0][c1] * a[r1][c0]) / j;
                }
            }
            VolumeGeometry { j, metric }
        }
    }
}

fn surface_geometry(dim: Dimension, geo: &VolumeGeometry, f: usize) -> SurfaceGeometry {
    let n_ref = dim.reference_normal(f);
    let mut n = [0.0; 3];
    for (k, &nk) in n_ref.iter().enumerate() {
        for (ni, gi) in n.iter_mut().zip(geo.metric[k]) {
            *ni += nk * gi;
        }
    }
    let norm = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();

    SurfaceGeometry {
        normal: n.map(|x| x / norm),
        sj: norm * geo.j,
        inv_j: 1.0 / geo.j,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_triangles() -> SimplexMesh {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ];
        SimplexMesh::new(Dimension::Two, vertices, vec![0, 1, 2, 0, 2, 3], 2).unwrap()
    }

    #[test]
    fn test_triangle_geometry() {
        let mesh = two_triangles();
        let e = ElementIndex::new(0);
        // area 1/2 => J = A/2
        assert_relative_eq!(mesh.volume(e).j, 0.25, epsilon = 1e-14);
        // face 0 runs (0,0) -> (1,0): length 1, normal (0,-1)
        let s = mesh.surface(e, 0);
        assert_relative_eq!(s.sj, 0.5, epsilon = 1e-14);
        assert_relative_eq!(s.normal[1], -1.0, epsilon = 1e-14);
        // face 1 runs (1,0) -> (1,1): normal (1,0)
        assert_relative_eq!(mesh.surface(e, 1).normal[0], 1.0, epsilon = 1e-14);
        // face 2 is the diagonal, length √2
        assert_relative_eq!(mesh.surface(e, 2).sj, 0.5 * 2f64.sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn test_shared_face_connected() {
        let mesh = two_triangles();
        let e0 = ElementIndex::new(0);
        assert_eq!(mesh.neighbor(e0, 2), Some(ElementIndex::new(1)));
        assert_eq!(mesh.neighbor(e0, 0), None);
        assert_eq!(mesh.boundary(e0, 0), BoundaryCode::WALL);
        assert_eq!(mesh.boundary(e0, 2), BoundaryCode::Interior);
        let fp = mesh.neighbor_face(e0, 2);
        assert_eq!(mesh.neighbor(ElementIndex::new(1), fp), Some(e0));
    }

    #[test]
    fn test_clockwise_element_is_reoriented() {
        let vertices = vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        let mesh = SimplexMesh::new(Dimension::Two, vertices, vec![0, 1, 2], 1).unwrap();
        assert!(mesh.volume(ElementIndex::new(0)).j > 0.0);
    }

    #[test]
    fn test_tetrahedron_geometry() {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mesh = SimplexMesh::new(Dimension::Three, vertices, vec![0, 1, 2, 3], 1).unwrap();
        let e = ElementIndex::new(0);
        // volume 1/6, reference volume 4/3
        assert_relative_eq!(mesh.volume(e).j, 0.125, epsilon = 1e-14);
        // face 0 is z = 0 with normal -z and area 1/2
        let s = mesh.surface(e, 0);
        assert_relative_eq!(s.normal[2], -1.0, epsilon = 1e-14);
        assert_relative_eq!(s.sj, 0.25, epsilon = 1e-14);
        // slanted face area √3/2
        assert_relative_eq!(mesh.surface(e, 2).sj, 0.25 * 3f64.sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let err = SimplexMesh::new(Dimension::Two, vec![], vec![], 0).unwrap_err();
        assert_eq!(err, MrabError::EmptyMesh);
    }
}
