//! Spatial dimension of a simplex mesh.
//!
//! Everything that depends on whether elements are triangles or tetrahedra
//! (node counts, face counts, reference face topology) is derived here.

/// Spatial dimension: triangles in 2D, tetrahedra in 3D.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Two,
    Three,
}

/// Local vertices of each triangle face (counter-clockwise element).
const TRI_FACE_VERTICES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];

/// Local vertices of each tetrahedron face.
const TET_FACE_VERTICES: [&[usize]; 4] = [&[0, 1, 2], &[0, 1, 3], &[1, 2, 3], &[0, 2, 3]];

impl Dimension {
    /// Number of spatial coordinates.
    pub const fn n_dims(self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }

    /// Faces per element.
    pub const fn n_faces(self) -> usize {
        match self {
            Dimension::Two => 3,
            Dimension::Three => 4,
        }
    }

    /// Vertices per element.
    pub const fn n_verts(self) -> usize {
        self.n_dims() + 1
    }

    /// Vertices per face.
    pub const fn n_face_verts(self) -> usize {
        self.n_dims()
    }

    /// Volume nodes of a degree-`n` element.
    pub const fn np(self, n: usize) -> usize {
        match self {
            Dimension::Two => (n + 1) * (n + 2) / 2,
            Dimension::Three => (n + 1) * (n + 2) * (n + 3) / 6,
        }
    }

    /// Nodes on one face of a degree-`n` element.
    pub const fn nfp(self, n: usize) -> usize {
        match self {
            Dimension::Two => n + 1,
            Dimension::Three => (n + 1) * (n + 2) / 2,
        }
    }

    /// Local vertex ids of face `f`.
    pub fn face_vertices(self, f: usize) -> &'static [usize] {
        match self {
            Dimension::Two => TRI_FACE_VERTICES[f],
            Dimension::Three => TET_FACE_VERTICES[f],
        }
    }

    /// Local vertex not on face `f`.
    pub fn opposite_vertex(self, f: usize) -> usize {
        let on_face = self.face_vertices(f);
        (0..self.n_verts())
            .find(|v| !on_face.contains(v))
            .unwrap_or(0)
    }

    /// Unnormalized outward normal of face `f` in reference coordinates.
    pub fn reference_normal(self, f: usize) -> [f64; 3] {
        match (self, f) {
            (Dimension::Two, 0) => [0.0, -1.0, 0.0],
            (Dimension::Two, 1) => [1.0, 1.0, 0.0],
            (Dimension::Two, _) => [-1.0, 0.0, 0.0],
            (Dimension::Three, 0) => [0.0, 0.0, -1.0],
            (Dimension::Three, 1) => [0.0, -1.0, 0.0],
            (Dimension::Three, 2) => [1.0, 1.0, 1.0],
            (Dimension::Three, _) => [-1.0, 0.0, 0.0],
        }
    }

    /// Measure of the reference element.
    pub const fn reference_volume(self) -> f64 {
        match self {
            Dimension::Two => 2.0,
            Dimension::Three => 4.0 / 3.0,
        }
    }

    /// Measure of the reference face parameter domain.
    pub const fn reference_face_measure(self) -> f64 {
        2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_counts() {
        assert_eq!(Dimension::Two.np(3), 10);
        assert_eq!(Dimension::Two.nfp(3), 4);
        assert_eq!(Dimension::Three.np(3), 20);
        assert_eq!(Dimension::Three.nfp(3), 10);
    }

    #[test]
    fn test_opposite_vertices() {
        let tri: Vec<_> = (0..3).map(|f| Dimension::Two.opposite_vertex(f)).collect();
        assert_eq!(tri, vec![2, 0, 1]);
        let tet: Vec<_> = (0..4).map(|f| Dimension::Three.opposite_vertex(f)).collect();
        assert_eq!(tet, vec![3, 2, 0, 1]);
    }
}
