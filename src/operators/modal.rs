//! Bernstein Vandermonde matrices.
//!
//! The nodal points of this crate are the Bernstein domain points
//! (equispaced lattice α/N), which are unisolvent for degree N:
//! - VB[i,j] = B_j(x_i)
//! - nodal_values = VB * bb_coeffs
//! - bb_coeffs = VB^{-1} * nodal_values
//!
//! The face inverse is used to convert analytic incident fields sampled at
//! face nodes into trace coefficients; the volume inverse sets initial
//! conditions.

use faer::Mat;

use super::bernstein::{BernsteinBasis, inverse};
use crate::error::Result;

/// Bernstein Vandermonde matrix and its inverse.
#[derive(Clone, Debug)]
pub struct BbVandermonde {
    /// VB[i,j] = B_j at domain point i
    pub v: Mat<f64>,
    /// Inverse Vandermonde matrix
    pub v_inv: Mat<f64>,
    /// Polynomial degree
    pub degree: usize,
}

impl BbVandermonde {
    /// Vandermonde of degree `n` on a `dim`-simplex.
    pub fn new(dim: usize, n: usize) -> Result<Self> {
        let basis = BernsteinBasis::new(dim, n);
        let np = basis.len();

        let mut v = Mat::zeros(np, np);
        for i in 0..np {
            let values = basis.evaluate(&basis.domain_point(i));
            for (j, b) in values.into_iter().enumerate() {
                v[(i, j)] = b;
            }
        }
        let v_inv = inverse(&v, "Bernstein Vandermonde")?;

        Ok(Self {
            v,
            v_inv,
            degree: n,
        })
    }

    /// Convert `n_fields` interleaved nodal values to coefficients.
    pub fn nodal_to_bb(&self, nodal: &[f64], bb: &mut [f64], n_fields: usize) {
        let n = self.v_inv.nrows();
        for i in 0..n {
            let out = &mut bb[i * n_fields..(i + 1) * n_fields];
            out.fill(0.0);
            for m in 0..n {
                let w = self.v_inv[(i, m)];
                for (o, &x) in out.iter_mut().zip(&nodal[m * n_fields..(m + 1) * n_fields]) {
                    *o += w * x;
                }
            }
        }
    }
}
