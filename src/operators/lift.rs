//! Bernstein-Bezier surface lift.
//!
//! The lift maps face flux coefficients to volume contributions:
//! LIFT_f = M^{-1} E_f^T M_f
//!
//! where E_f extracts the face coefficients of a volume polynomial (a
//! Bernstein polynomial restricted to a face is again a Bernstein
//! polynomial), M is the volume mass and M_f the face mass. It factors as
//! LIFT_f = EL_f L0 with two sparse stages:
//!
//! - `L0`, one face-local operator shared by every face. It couples only
//!   multi-indices one step apart (3 entries per row on edges, 7 on
//!   triangles) and has row sums μ_0 = (N+1)(N+d)/2. On edges it acts on
//!   Legendre mode k as μ_0 - k(k+1)/2.
//! - `EL`, which writes ℓ_j (E_{N-j}^N)^T into the volume nodes at distance
//!   j from the face, ℓ_j = (-1)^j C(N,j)/(j+1).
//!
//! Both stages are stored as [`SparseRows`] so the kernel never touches the
//! dense operators.

use faer::Mat;

use super::bernstein::{BernsteinBasis, multinomial};
use crate::error::{MrabError, Result};
use crate::types::Dimension;

/// Row-sparse operator with a fixed number of entries per row.
///
/// Rows shorter than `width` are padded with zero weights pointing at
/// column 0.
#[derive(Clone, Debug)]
pub struct SparseRows {
    n_rows: usize,
    n_cols: usize,
    width: usize,
    ids: Vec<usize>,
    vals: Vec<f64>,
}

impl SparseRows {
    /// Build from explicit stencils, `width` entries per row.
    pub fn from_stencils(n_cols: usize, width: usize, ids: Vec<usize>, vals: Vec<f64>) -> Self {
        debug_assert_eq!(ids.len(), vals.len());
        debug_assert!(width > 0 && ids.len() % width == 0);
        Self {
            n_rows: ids.len() / width,
            n_cols,
            width,
            ids,
            vals,
        }
    }

    /// Compress a dense matrix, dropping entries with |a_ij| <= `drop_tol`.
    pub fn from_dense(m: &Mat<f64>, drop_tol: f64) -> Self {
        let rows = (0..m.nrows())
            .map(|i| {
                (0..m.ncols())
                    .filter(|&j| m[(i, j)].abs() > drop_tol)
                    .map(|j| (j, m[(i, j)]))
                    .collect()
            })
            .collect();
        Self::from_rows(m.ncols(), rows)
    }

    /// Pack ragged `(column, weight)` rows, padding to the widest row.
    pub fn from_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
        let mut ids = Vec::with_capacity(rows.len() * width);
        let mut vals = Vec::with_capacity(rows.len() * width);
        for row in &rows {
            for k in 0..width {
                let (j, v) = row.get(k).copied().unwrap_or((0, 0.0));
                ids.push(j);
                vals.push(v);
            }
        }

        Self {
            n_rows: rows.len(),
            n_cols,
            width,
            ids,
            vals,
        }
    }

    /// Number of output rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of input columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Stored entries per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Column ids and weights of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let start = i * self.width;
        (
            &self.ids[start..start + self.width],
            &self.vals[start..start + self.width],
        )
    }

    /// y = A x for `n_fields` interleaved fields (`x[col * n_fields + fld]`).
    #[inline]
    pub fn apply(&self, x: &[f64], y: &mut [f64], n_fields: usize) {
        for i in 0..self.n_rows {
            let (ids, vals) = self.row(i);
            let out = &mut y[i * n_fields..(i + 1) * n_fields];
            out.fill(0.0);
            for (&j, &w) in ids.iter().zip(vals) {
                let xj = &x[j * n_fields..(j + 1) * n_fields];
                for (o, &v) in out.iter_mut().zip(xj) {
                    *o += w * v;
                }
            }
        }
    }

    /// Dense copy, for tests and diagnostics.
    pub fn to_dense(&self) -> Mat<f64> {
        let mut m = Mat::zeros(self.n_rows, self.n_cols);
        for i in 0..self.n_rows {
            let (ids, vals) = self.row(i);
            for (&j, &w) in ids.iter().zip(vals) {
                m[(i, j)] += w;
            }
        }
        m
    }
}

/// Two-stage sparse Bernstein-Bezier lift for one degree.
#[derive(Clone, Debug)]
pub struct BbLift {
    n_faces: usize,
    nfp: usize,
    np: usize,
    /// Face-local stage, applied per face.
    pub l0: SparseRows,
    /// Stacked ℓ_j (E_{N-j}^N)^T, one row per volume node.
    pub el: SparseRows,
}

impl BbLift {
    /// Build the reference lift for degree `n`.
    pub fn new(dim: Dimension, n: usize) -> Result<Self> {
        let d = dim.n_dims();
        let volume = BernsteinBasis::new(d, n);
        let face = BernsteinBasis::new(d - 1, n);
        let n_faces = dim.n_faces();

        let l0 = face_operator(&face, d);
        let el = elevation_stack(dim, n, &volume, &face);
        if el.n_rows() != volume.len() || l0.n_rows() != face.len() {
            return Err(MrabError::dimension_mismatch(
                format!("{} volume and {} face rows", volume.len(), face.len()),
                format!("{} and {}", el.n_rows(), l0.n_rows()),
            ));
        }

        Ok(Self {
            n_faces,
            nfp: face.len(),
            np: volume.len(),
            l0,
            el,
        })
    }

    /// Entries per row of `EL`.
    pub fn max_nnz(&self) -> usize {
        self.el.width()
    }

    /// Lift face fluxes to the volume.
    ///
    /// # Arguments
    /// * `flux` - `n_faces * nfp` face values, `n_fields` interleaved
    /// * `scratch` - Same size as `flux`
    /// * `out` - `np * n_fields`, overwritten
    pub fn apply(&self, flux: &[f64], scratch: &mut [f64], out: &mut [f64], n_fields: usize) {
        let block = self.nfp * n_fields;
        for f in 0..self.n_faces {
            let range = f * block..(f + 1) * block;
            self.l0.apply(&flux[range.clone()], &mut scratch[range], n_fields);
        }
        self.el.apply(scratch, &mut out[..self.np * n_fields], n_fields);
    }
}

/// `L0` on a face of a `d`-dimensional element.
///
/// (L0 h)_β = μ_0 h_β + ½ Σ_{a≠b} β_a (β_b + 1) (h_{β-e_a+e_b} - h_β)
fn face_operator(face: &BernsteinBasis, d: usize) -> SparseRows {
    let n = face.degree();
    let mu0 = 0.5 * ((n + 1) * (n + d)) as f64;
    let width = 1 + d * (d - 1);

    let mut ids = Vec::with_capacity(face.len() * width);
    let mut vals = Vec::with_capacity(face.len() * width);
    let mut moved = vec![0; d];
    for row in 0..face.len() {
        let beta = face.multi_index(row);
        let mut diag = mu0;
        let start = ids.len();
        ids.push(row);
        vals.push(0.0);
        for a in 0..d {
            for b in (0..d).filter(|&b| b != a) {
                if beta[a] == 0 {
                    ids.push(0);
                    vals.push(0.0);
                    continue;
                }
                moved.copy_from_slice(beta);
                moved[a] -= 1;
                moved[b] += 1;
                let w = 0.5 * (beta[a] * (beta[b] + 1)) as f64;
                ids.push(face.index_of(&moved).unwrap_or(row));
                vals.push(w);
                diag -= w;
            }
        }
        vals[start] = diag;
    }
    SparseRows::from_stencils(face.len(), width, ids, vals)
}

/// Stacked `EL` rows over all faces.
///
/// A volume node α at distance j = α_o from face f (o the opposite vertex)
/// has face part β' of degree N - j and reads the face coefficients β ≥ β'
/// with weight ℓ_j C(N-j, β') C(j, β - β') / C(N, β).
fn elevation_stack(
    dim: Dimension,
    n: usize,
    volume: &BernsteinBasis,
    face: &BernsteinBasis,
) -> SparseRows {
    let nfp = face.len();
    let face_dim = face.dim();
    let offsets: Vec<BernsteinBasis> = (0..=n).map(|j| BernsteinBasis::new(face_dim, j)).collect();
    let ell: Vec<f64> = (0..=n)
        .map(|j| {
            let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
            sign * multinomial(n, &[j, n - j]) / (j + 1) as f64
        })
        .collect();

    let mut beta = vec![0; face_dim + 1];
    let rows = (0..volume.len())
        .map(|i| {
            let alpha = volume.multi_index(i);
            let mut row = Vec::new();
            for f in 0..dim.n_faces() {
                let verts = dim.face_vertices(f);
                let j = alpha[dim.opposite_vertex(f)];
                let base: Vec<usize> = verts.iter().map(|&v| alpha[v]).collect();
                let c_base = multinomial(n - j, &base);

                let shifts = &offsets[j];
                for k in 0..shifts.len() {
                    let delta = shifts.multi_index(k);
                    for (out, (&b, &dl)) in beta.iter_mut().zip(base.iter().zip(delta)) {
                        *out = b + dl;
                    }
                    if let Some(m) = face.index_of(&beta) {
                        let w = ell[j] * c_base * multinomial(j, delta) / multinomial(n, &beta);
                        row.push((f * nfp + m, w));
                    }
                }
            }
            row
        })
        .collect();

    SparseRows::from_rows(dim.n_faces() * nfp, rows)
}

/// Volume node of every face node, per face, in face-local Bernstein order.
///
/// Face `f` consists of the volume multi-indices with a zero at the vertex
/// opposite the face; the face multi-index lists the remaining entries in
/// the face's vertex order.
pub fn face_extraction(
    dim: Dimension,
    n: usize,
    volume: &BernsteinBasis,
    face: &BernsteinBasis,
) -> Vec<Vec<usize>> {
    (0..dim.n_faces())
        .map(|f| {
            let verts = dim.face_vertices(f);
            (0..face.len())
                .map(|m| {
                    let beta = face.multi_index(m);
                    let mut alpha = vec![0; dim.n_verts()];
                    for (&v, &b) in verts.iter().zip(beta) {
                        alpha[v] = b;
                    }
                    debug_assert_eq!(alpha.iter().sum::<usize>(), n);
                    volume.index_of(&alpha).unwrap_or(0)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::bernstein::{inverse, mass_matrix};

    #[test]
    fn test_sparse_rows_roundtrip() {
        let mut m = Mat::zeros(3, 4);
        m[(0, 1)] = 2.0;
        m[(1, 0)] = -1.0;
        m[(1, 3)] = 0.5;
        m[(2, 2)] = 4.0;
        let s = SparseRows::from_dense(&m, 0.0);
        assert_eq!(s.width(), 2);

        let x = [1.0, 2.0, 3.0, 4.0];
        let mut y = [0.0; 3];
        s.apply(&x, &mut y, 1);
        assert_eq!(y, [4.0, 1.0, 12.0]);
    }

    #[test]
    fn test_face_extraction_triangle() {
        let volume = BernsteinBasis::new(2, 2);
        let face = BernsteinBasis::new(1, 2);
        let ext = face_extraction(Dimension::Two, 2, &volume, &face);
        // Face 0 runs vertex 0 -> vertex 1 with α_2 = 0
        for (m, &node) in ext[0].iter().enumerate() {
            let alpha = volume.multi_index(node);
            assert_eq!(alpha[2], 0);
            assert_eq!(alpha[0], face.multi_index(m)[0]);
        }
    }

    /// Dense M^{-1} E_f^T M_f for every face, stacked by columns.
    fn dense_lift(dim: Dimension, n: usize) -> Mat<f64> {
        let d = dim.n_dims();
        let volume = BernsteinBasis::new(d, n);
        let face = BernsteinBasis::new(d - 1, n);
        let mass_inv =
            inverse(&mass_matrix(&volume, &volume, dim.reference_volume()), "mass").unwrap();
        let face_mass = mass_matrix(&face, &face, dim.reference_face_measure());
        let nfp = face.len();

        let mut lift = Mat::zeros(volume.len(), dim.n_faces() * nfp);
        for (f, nodes) in face_extraction(dim, n, &volume, &face).iter().enumerate() {
            for i in 0..volume.len() {
                for m in 0..nfp {
                    lift[(i, f * nfp + m)] = nodes
                        .iter()
                        .enumerate()
                        .map(|(k, &v)| mass_inv[(i, v)] * face_mass[(k, m)])
                        .sum();
                }
            }
        }
        lift
    }

    #[test]
    fn test_factored_lift_matches_dense() {
        for (dim, n) in [
            (Dimension::Two, 1),
            (Dimension::Two, 3),
            (Dimension::Two, 6),
            (Dimension::Three, 1),
            (Dimension::Three, 3),
            (Dimension::Three, 4),
        ] {
            let lift = BbLift::new(dim, n).unwrap();
            let dense = dense_lift(dim, n);
            let nfp = dim.nfp(n);
            let scale = (0..dense.nrows())
                .flat_map(|i| (0..dense.ncols()).map(move |j| (i, j)))
                .map(|(i, j)| dense[(i, j)].abs())
                .fold(0.0, f64::max);

            // unit flux on one face node at a time
            for col in 0..dense.ncols() {
                let mut flux = vec![0.0; dense.ncols()];
                flux[col] = 1.0;
                let mut scratch = vec![0.0; flux.len()];
                let mut out = vec![0.0; dense.nrows()];
                lift.apply(&flux, &mut scratch, &mut out, 1);
                for (i, v) in out.iter().enumerate() {
                    assert!(
                        (v - dense[(i, col)]).abs() < 1e-9 * scale,
                        "{:?} N={} node {} col {} (face {}): {} vs {}",
                        dim,
                        n,
                        i,
                        col,
                        col / nfp,
                        v,
                        dense[(i, col)]
                    );
                }
            }
        }
    }

    #[test]
    fn test_lift_stages_are_narrow() {
        for n in 1..=7 {
            let two = BbLift::new(Dimension::Two, n).unwrap();
            assert!(two.l0.width() <= 3);
            assert_eq!(two.max_nnz(), n + 3);
            assert!(two.max_nnz() < 3 * Dimension::Two.nfp(n));

            let three = BbLift::new(Dimension::Three, n).unwrap();
            assert!(three.l0.width() <= 7);
            assert_eq!(three.max_nnz(), 3 + Dimension::Three.nfp(n));
            if n > 1 {
                assert!(three.max_nnz() < Dimension::Three.np(n));
            }
        }
    }

    #[test]
    fn test_lift_reproduces_face_integral() {
        // 1^T M LIFT_f g = ∫_f g; for g = 1 this is the face measure
        for (dim, n) in [(Dimension::Two, 1), (Dimension::Two, 4), (Dimension::Three, 2)] {
            let lift = BbLift::new(dim, n).unwrap();
            let d = dim.n_dims();
            let volume = BernsteinBasis::new(d, n);
            let mass = mass_matrix(&volume, &volume, dim.reference_volume());
            let nfp = dim.nfp(n);

            for f in 0..dim.n_faces() {
                let mut flux = vec![0.0; dim.n_faces() * nfp];
                flux[f * nfp..(f + 1) * nfp].fill(1.0);
                let mut scratch = vec![0.0; flux.len()];
                let mut out = vec![0.0; volume.len()];
                lift.apply(&flux, &mut scratch, &mut out, 1);

                let mut total = 0.0;
                for i in 0..volume.len() {
                    for j in 0..volume.len() {
                        total += mass[(i, j)] * out[j];
                    }
                }
                assert!((total - 2.0).abs() < 1e-10, "{:?} N={} face {}: {}", dim, n, f, total);
            }
        }
    }
}
