//! Collapsed Gauss-Legendre cubature on the reference simplex.
//!
//! The simplex is the image of the cube [-1,1]^d under the Duffy map
//!
//! 2D: r = (1+a)(1-b)/2 - 1,           s = b
//! 3D: r = (1+a)(1-b)(1-c)/4 - 1,      s = (1+b)(1-c)/2 - 1,   t = c
//!
//! with Jacobian (1-b)/2 in 2D and (1-b)/2 ((1-c)/2)^2 in 3D. Tensor
//! Gauss-Legendre points on the cube give a positive rule on the simplex.
//!
//! [`CubatureOps`] carries the interpolation from Bernstein coefficients to
//! cubature points and the L2 projection back, used wherever a pointwise
//! product has to be formed (variable wave speed, PML damping, BGK
//! relaxation).

use faer::Mat;

use super::bernstein::{BernsteinBasis, barycentric, mass_matrix, matmul, solve, transpose};
use crate::error::Result;
use crate::polynomial::gauss_legendre;
use crate::types::Dimension;

/// Points and weights of a simplex cubature rule.
#[derive(Clone, Debug)]
pub struct Cubature {
    /// Reference coordinates (r, s, t); unused entries are zero.
    pub points: Vec<[f64; 3]>,
    /// Weights summing to the reference measure.
    pub weights: Vec<f64>,
}

impl Cubature {
    /// Collapsed rule with `n_1d` points per direction.
    pub fn collapsed(dim: Dimension, n_1d: usize) -> Self {
        let (x, w) = gauss_legendre(n_1d);
        let mut points = Vec::new();
        let mut weights = Vec::new();

        match dim {
            Dimension::Two => {
                for (&b, &wb) in x.iter().zip(&w) {
                    for (&a, &wa) in x.iter().zip(&w) {
                        let r = 0.5 * (1.0 + a) * (1.0 - b) - 1.0;
                        points.push([r, b, 0.0]);
                        weights.push(wa * wb * 0.5 * (1.0 - b));
                    }
                }
            }
            Dimension::Three => {
                for (&c, &wc) in x.iter().zip(&w) {
                    for (&b, &wb) in x.iter().zip(&w) {
                        for (&a, &wa) in x.iter().zip(&w) {
                            let r = 0.25 * (1.0 + a) * (1.0 - b) * (1.0 - c) - 1.0;
                            let s = 0.5 * (1.0 + b) * (1.0 - c) - 1.0;
                            let jac = 0.5 * (1.0 - b) * 0.25 * (1.0 - c) * (1.0 - c);
                            points.push([r, s, c]);
                            weights.push(wa * wb * wc * jac);
                        }
                    }
                }
            }
        }

        Self { points, weights }
    }

    /// Number of cubature points.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True for an empty rule.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Interpolation and projection between degree-`n` Bernstein coefficients
/// and cubature points.
#[derive(Clone, Debug)]
pub struct CubatureOps {
    /// Rule the operators are built on.
    pub rule: Cubature,
    /// `n_cub x Np` values of each Bernstein polynomial at the points.
    pub interp: Mat<f64>,
    /// `Np x n_cub` L2 projection M^{-1} V^T W.
    pub project: Mat<f64>,
}

impl CubatureOps {
    /// Build operators for degree `n`, exact for products of degree 2n+2.
    pub fn new(dim: Dimension, n: usize) -> Result<Self> {
        let d = dim.n_dims();
        let rule = Cubature::collapsed(dim, n + 2);
        let basis = BernsteinBasis::new(d, n);

        let mut interp = Mat::zeros(rule.len(), basis.len());
        for (k, p) in rule.points.iter().enumerate() {
            let values = basis.evaluate(&barycentric(&p[..d]));
            for (j, v) in values.into_iter().enumerate() {
                interp[(k, j)] = v;
            }
        }

        let mut vt_w = transpose(&interp);
        for j in 0..vt_w.ncols() {
            let w = rule.weights[j];
            for i in 0..vt_w.nrows() {
                vt_w[(i, j)] *= w;
            }
        }
        let mass = mass_matrix(&basis, &basis, dim.reference_volume());
        let project = solve(&mass, &vt_w, "cubature projection")?;

        Ok(Self {
            rule,
            interp,
            project,
        })
    }

    /// Number of cubature points.
    pub fn n_cub(&self) -> usize {
        self.rule.len()
    }

    /// Values at cubature points of `n_fields` interleaved fields.
    pub fn interpolate(&self, coeffs: &[f64], values: &mut [f64], n_fields: usize) {
        apply_dense(&self.interp, coeffs, values, n_fields);
    }

    /// Project `n_fields` interleaved cubature values to coefficients.
    pub fn project(&self, values: &[f64], coeffs: &mut [f64], n_fields: usize) {
        apply_dense(&self.project, values, coeffs, n_fields);
    }

    /// `project * interp`, which is the identity for this rule.
    pub fn roundtrip(&self) -> Mat<f64> {
        matmul(&self.project, &self.interp)
    }
}

fn apply_dense(m: &Mat<f64>, x: &[f64], y: &mut [f64], n_fields: usize) {
    for i in 0..m.nrows() {
        let out = &mut y[i * n_fields..(i + 1) * n_fields];
        out.fill(0.0);
        for j in 0..m.ncols() {
            let w = m[(i, j)];
            for (o, &v) in out.iter_mut().zip(&x[j * n_fields..(j + 1) * n_fields]) {
                *o += w * v;
            }
        }
    }
}
