//! Structured simplex mesh generators.
//!
//! Rectangles are split into two triangles along the diagonal from the
//! lower-left to the upper-right corner; boxes are split into six Kuhn
//! tetrahedra sharing the main diagonal, which keeps neighbouring cells
//! conforming.

use super::boundary_codes::BoundaryCode;
use super::simplex::SimplexMesh;
use crate::error::Result;
use crate::types::{Dimension, ElementIndex};

/// Uniform triangulation of [x0, x1] × [y0, y1].
#[derive(Clone, Debug)]
pub struct RectangleMesh {
    x0: f64,
    x1: f64,
    y0: f64,
    y1: f64,
    nx: usize,
    ny: usize,
    boundary: BoundaryCode,
}

impl RectangleMesh {
    /// Create a generator with `nx × ny` cells (2 triangles each).
    ///
    /// # Arguments
    /// * `x0`, `x1` - x-coordinate bounds
    /// * `y0`, `y1` - y-coordinate bounds
    /// * `nx` - number of cells in x-direction
    /// * `ny` - number of cells in y-direction
    pub fn new(x0: f64, x1: f64, y0: f64, y1: f64, nx: usize, ny: usize) -> Self {
        assert!(
            nx > 0 && ny > 0,
            "Need at least one cell in each direction"
        );
        assert!(x1 > x0 && y1 > y0, "Invalid domain bounds");
        Self {
            x0,
            x1,
            y0,
            y1,
            nx,
            ny,
            boundary: BoundaryCode::WALL,
        }
    }

    /// Boundary code for every domain-boundary face.
    pub fn with_boundary(mut self, code: BoundaryCode) -> Self {
        self.boundary = code;
        self
    }

    /// Build the mesh.
    pub fn build(&self) -> Result<SimplexMesh> {
        let (nx, ny) = (self.nx, self.ny);
        let dx = (self.x1 - self.x0) / nx as f64;
        let dy = (self.y1 - self.y0) / ny as f64;

        let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                vertices.push([self.x0 + i as f64 * dx, self.y0 + j as f64 * dy, 0.0]);
            }
        }

        let mut e_to_v = Vec::with_capacity(6 * nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let v0 = j * (nx + 1) + i; // bottom-left
                let v1 = v0 + 1; // bottom-right
                let v2 = v1 + (nx + 1); // top-right
                let v3 = v0 + (nx + 1); // top-left
                e_to_v.extend_from_slice(&[v0, v1, v2, v0, v2, v3]);
            }
        }

        let n_elements = 2 * nx * ny;
        let mut mesh = SimplexMesh::new(Dimension::Two, vertices, e_to_v, n_elements)?;
        apply_boundary(&mut mesh, self.boundary);
        Ok(mesh)
    }
}

/// Uniform Kuhn tetrahedralisation of a box.
#[derive(Clone, Debug)]
pub struct BoxMesh {
    lower: [f64; 3],
    upper: [f64; 3],
    cells: [usize; 3],
    boundary: BoundaryCode,
}

/// Vertex steps of the six Kuhn tetrahedra (x=1, y=2, z=4 bit offsets).
const KUHN: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];

impl BoxMesh {
    /// Create a generator with `cells[0] × cells[1] × cells[2]` cubes.
    pub fn new(lower: [f64; 3], upper: [f64; 3], cells: [usize; 3]) -> Self {
        assert!(cells.iter().all(|&c| c > 0), "Need at least one cell in each direction");
        assert!(
            (0..3).all(|k| upper[k] > lower[k]),
            "Invalid domain bounds"
        );
        Self {
            lower,
            upper,
            cells,
            boundary: BoundaryCode::WALL,
        }
    }

    /// Boundary code for every domain-boundary face.
    pub fn with_boundary(mut self, code: BoundaryCode) -> Self {
        self.boundary = code;
        self
    }

    /// Build the mesh.
    pub fn build(&self) -> Result<SimplexMesh> {
        let [nx, ny, nz] = self.cells;
        let h: Vec<f64> = (0..3)
            .map(|k| (self.upper[k] - self.lower[k]) / self.cells[k] as f64)
            .collect();
        let vid = |i: usize, j: usize, k: usize| (k * (ny + 1) + j) * (nx + 1) + i;

        let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    vertices.push([
                        self.lower[0] + i as f64 * h[0],
                        self.lower[1] + j as f64 * h[1],
                        self.lower[2] + k as f64 * h[2],
                    ]);
                }
            }
        }

        let mut e_to_v = Vec::with_capacity(24 * nx * ny * nz);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let corner = |bits: usize| {
                        vid(i + (bits & 1), j + ((bits >> 1) & 1), k + ((bits >> 2) & 1))
                    };
                    for tet in KUHN {
                        e_to_v.extend(tet.iter().map(|&b| corner(b)));
                    }
                }
            }
        }

        let n_elements = 6 * nx * ny * nz;
        let mut mesh = SimplexMesh::new(Dimension::Three, vertices, e_to_v, n_elements)?;
        apply_boundary(&mut mesh, self.boundary);
        Ok(mesh)
    }
}

fn apply_boundary(mesh: &mut SimplexMesh, code: BoundaryCode) {
    let nf = mesh.dim().n_faces();
    for e in ElementIndex::iter(mesh.n_total()) {
        for f in 0..nf {
            if mesh.neighbor(e, f).is_none() {
                mesh.set_boundary(e, f, code);
            }
        }
    }
}
