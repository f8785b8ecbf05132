//! Face-trace projection between neighbouring elements of different degree.
//!
//! Traces are Bernstein coefficients on a face. Neighbour degrees differ by
//! at most one, so three cases occur:
//!
//! - neighbour one degree higher: [`TraceRaise`], exact degree elevation with
//!   a sparse stencil of `face_dim + 1` entries per fine node,
//! - neighbour one degree lower: [`TraceLower`], dense L2 projection,
//! - equal degree: plain copy, no operator applied.
//!
//! Both operators map all-ones to all-ones (Bernstein polynomials form a
//! partition of unity) and `lower(raise(c)) == c`.

use faer::Mat;

use super::bernstein::{BernsteinBasis, mass_matrix, solve};
use super::lift::SparseRows;
use crate::error::Result;

/// Sparse raise operator from degree `n` to `n + 1` on a face.
#[derive(Clone, Debug)]
pub struct TraceRaise {
    from_degree: usize,
    stencil: SparseRows,
}

impl TraceRaise {
    /// Build the raise from degree `n` on a `face_dim`-simplex.
    pub fn new(face_dim: usize, n: usize) -> Self {
        let coarse = BernsteinBasis::new(face_dim, n);
        let fine = BernsteinBasis::new(face_dim, n + 1);
        let width = face_dim + 1;

        let mut ids = Vec::with_capacity(fine.len() * width);
        let mut vals = Vec::with_capacity(fine.len() * width);
        let mut shifted = vec![0; width];
        for row in 0..fine.len() {
            let gamma = fine.multi_index(row);
            for i in 0..width {
                shifted.copy_from_slice(gamma);
                let col = if gamma[i] > 0 {
                    shifted[i] -= 1;
                    coarse.index_of(&shifted)
                } else {
                    None
                };
                match col {
                    Some(col) => {
                        ids.push(col);
                        vals.push(gamma[i] as f64 / (n + 1) as f64);
                    }
                    None => {
                        ids.push(0);
                        vals.push(0.0);
                    }
                }
            }
        }

        Self {
            from_degree: n,
            stencil: SparseRows::from_stencils(coarse.len(), width, ids, vals),
        }
    }

    /// Coarse degree the operator reads.
    pub fn from_degree(&self) -> usize {
        self.from_degree
    }

    /// Entries per fine node (2 on an edge, 3 on a triangle face).
    pub fn stencil_width(&self) -> usize {
        self.stencil.width()
    }

    /// Number of fine face nodes produced.
    pub fn n_out(&self) -> usize {
        self.stencil.n_rows()
    }

    /// Number of coarse face nodes read.
    pub fn n_in(&self) -> usize {
        self.stencil.n_cols()
    }

    /// Raise `n_fields` interleaved trace fields into `fine`.
    #[inline]
    pub fn apply(&self, coarse: &[f64], fine: &mut [f64], n_fields: usize) {
        self.stencil.apply(coarse, fine, n_fields);
    }

    /// Sparse stencil.
    pub fn stencil(&self) -> &SparseRows {
        &self.stencil
    }
}

/// Dense lower operator from degree `n` to `n - 1` on a face.
///
/// L = M_{n-1}^{-1} M_{n-1,n}, the L2 projection onto the coarser space.
#[derive(Clone, Debug)]
pub struct TraceLower {
    from_degree: usize,
    matrix: Mat<f64>,
}

impl TraceLower {
    /// Build the lower from degree `n >= 1` on a `face_dim`-simplex.
    pub fn new(face_dim: usize, n: usize) -> Result<Self> {
        let fine = BernsteinBasis::new(face_dim, n);
        let coarse = BernsteinBasis::new(face_dim, n - 1);

        let m_coarse = mass_matrix(&coarse, &coarse, 1.0);
        let m_mixed = mass_matrix(&coarse, &fine, 1.0);
        let matrix = solve(&m_coarse, &m_mixed, "trace lower")?;

        Ok(Self {
            from_degree: n,
            matrix,
        })
    }

    /// Fine degree the operator reads.
    pub fn from_degree(&self) -> usize {
        self.from_degree
    }

    /// Dense `Nfp(n-1) x Nfp(n)` matrix.
    pub fn matrix(&self) -> &Mat<f64> {
        &self.matrix
    }

    /// Lower `n_fields` interleaved trace fields into `coarse`.
    #[inline]
    pub fn apply(&self, fine: &[f64], coarse: &mut [f64], n_fields: usize) {
        let (rows, cols) = (self.matrix.nrows(), self.matrix.ncols());
        for i in 0..rows {
            let out = &mut coarse[i * n_fields..(i + 1) * n_fields];
            out.fill(0.0);
            for m in 0..cols {
                let w = self.matrix[(i, m)];
                for (o, &v) in out.iter_mut().zip(&fine[m * n_fields..(m + 1) * n_fields]) {
                    *o += w * v;
                }
            }
        }
    }
}

/// Which transfer a face needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceTransfer {
    Raise,
    Lower,
    Copy,
}

impl TraceTransfer {
    /// Pick the transfer from own degree `n` to neighbour degree `np`.
    #[inline]
    pub fn between(n: usize, np: usize) -> Self {
        if np > n {
            TraceTransfer::Raise
        } else if np < n {
            TraceTransfer::Lower
        } else {
            TraceTransfer::Copy
        }
    }
}

/// Per-degree raise and lower tables for one face dimension.
///
/// `raise[n]` reads degree `n`, `lower[n]` reads degree `n`.
#[derive(Clone, Debug)]
pub struct TraceProjector {
    raise: Vec<Option<TraceRaise>>,
    lower: Vec<Option<TraceLower>>,
    n_max: usize,
}

impl TraceProjector {
    /// Build tables for degrees `1..=n_max`.
    pub fn new(face_dim: usize, n_max: usize) -> Result<Self> {
        let mut raise = Vec::with_capacity(n_max + 1);
        let mut lower = Vec::with_capacity(n_max + 1);
        for n in 0..=n_max {
            raise.push((n >= 1 && n < n_max).then(|| TraceRaise::new(face_dim, n)));
            lower.push(if n >= 2 {
                Some(TraceLower::new(face_dim, n)?)
            } else {
                None
            });
        }
        Ok(Self {
            raise,
            lower,
            n_max,
        })
    }

    /// Highest supported degree.
    pub fn n_max(&self) -> usize {
        self.n_max
    }

    /// Raise operator reading degree `n`.
    pub fn raise(&self, n: usize) -> Option<&TraceRaise> {
        self.raise.get(n).and_then(Option::as_ref)
    }

    /// Lower operator reading degree `n`.
    pub fn lower(&self, n: usize) -> Option<&TraceLower> {
        self.lower.get(n).and_then(Option::as_ref)
    }

    /// Project a degree-`n` trace to degree `np` (`|n - np| <= 1`).
    ///
    /// Returns the transfer applied. `dst` must hold at least
    /// `Nfp(np) * n_fields` values; the equal-degree branch copies
    /// `src` unchanged.
    pub fn project(
        &self,
        n: usize,
        np: usize,
        src: &[f64],
        dst: &mut [f64],
        n_fields: usize,
    ) -> TraceTransfer {
        let transfer = TraceTransfer::between(n, np);
        match transfer {
            TraceTransfer::Raise => {
                if let Some(op) = self.raise(n) {
                    let len = op.n_out() * n_fields;
                    op.apply(src, &mut dst[..len], n_fields);
                }
            }
            TraceTransfer::Lower => {
                if let Some(op) = self.lower(n) {
                    let len = op.matrix().nrows() * n_fields;
                    op.apply(src, &mut dst[..len], n_fields);
                }
            }
            TraceTransfer::Copy => {
                let len = src.len().min(dst.len());
                dst[..len].copy_from_slice(&src[..len]);
            }
        }
        transfer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::bernstein::{elevation_matrix, factorial};

    fn nfp(face_dim: usize, n: usize) -> usize {
        (factorial(n + face_dim) / (factorial(n) * factorial(face_dim))).round() as usize
    }

    #[test]
    fn test_raise_stencil_width() {
        assert_eq!(TraceRaise::new(1, 3).stencil_width(), 2);
        assert_eq!(TraceRaise::new(2, 3).stencil_width(), 3);
    }

    #[test]
    fn test_raise_matches_dense_elevation() {
        let raise = TraceRaise::new(2, 2);
        let dense = elevation_matrix(2, 2);
        let sparse = raise.stencil().to_dense();
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                assert!((dense[(i, j)] - sparse[(i, j)]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_constant_preserved() {
        for face_dim in [1, 2] {
            let proj = TraceProjector::new(face_dim, 6).unwrap();
            for n in 1..6 {
                let ones = vec![1.0; nfp(face_dim, n)];
                let mut up = vec![0.0; nfp(face_dim, n + 1)];
                proj.project(n, n + 1, &ones, &mut up, 1);
                assert!(up.iter().all(|&v| (v - 1.0).abs() < 1e-14));

                let mut down = vec![0.0; nfp(face_dim, n)];
                proj.project(n + 1, n, &up, &mut down, 1);
                assert!(down.iter().all(|&v| (v - 1.0).abs() < 1e-12), "{:?}", down);
            }
        }
    }

    #[test]
    fn test_lower_after_raise_is_identity() {
        let proj = TraceProjector::new(1, 5).unwrap();
        let n = 3;
        let src: Vec<f64> = (0..nfp(1, n)).map(|i| (i as f64).cos()).collect();
        let mut up = vec![0.0; nfp(1, n + 1)];
        let mut back = vec![0.0; nfp(1, n)];
        assert_eq!(proj.project(n, n + 1, &src, &mut up, 1), TraceTransfer::Raise);
        assert_eq!(proj.project(n + 1, n, &up, &mut back, 1), TraceTransfer::Lower);
        for (a, b) in src.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_equal_degree_copies_bitwise() {
        let proj = TraceProjector::new(2, 4).unwrap();
        let src: Vec<f64> = (0..nfp(2, 3) * 4).map(|i| 0.1 + (i as f64).sqrt()).collect();
        let mut dst = vec![f64::NAN; src.len()];
        assert_eq!(proj.project(3, 3, &src, &mut dst, 4), TraceTransfer::Copy);
        for (a, b) in src.iter().zip(&dst) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_multiple_fields_are_independent() {
        let proj = TraceProjector::new(1, 3).unwrap();
        // field 0 all ones, field 1 all twos
        let src = [1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        let mut dst = [0.0; 8];
        proj.project(2, 3, &src, &mut dst, 2);
        for node in dst.chunks(2) {
            assert!((node[0] - 1.0).abs() < 1e-14);
            assert!((node[1] - 2.0).abs() < 1e-14);
        }
    }
}
