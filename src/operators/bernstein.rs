//! Bernstein-Bezier polynomials on simplices.
//!
//! A degree-N Bernstein polynomial on a d-simplex is indexed by a
//! multi-index α with d+1 non-negative entries summing to N:
//!
//! B_α^N(λ) = N!/(α_0!...α_d!) λ_0^α_0 ... λ_d^α_d
//!
//! where λ are barycentric coordinates. On the reference simplex with
//! vertices (-1,...,-1), (1,-1,...), ..., (-1,...,1) we use
//! λ_{k+1} = (1 + r_k)/2 and λ_0 = 1 - Σ λ_{k+1}.
//!
//! Products of Bernstein polynomials are again Bernstein polynomials and all
//! degree-k polynomials share the same integral, so mass matrices are exact
//! closed forms. Degree elevation and differentiation are sparse.

use std::collections::HashMap;

use faer::{Mat, linalg::solvers::Solve};

use crate::error::{MrabError, Result};

/// Bernstein basis of one degree on a simplex of dimension `dim`.
///
/// The ordering of multi-indices runs the last barycentric entry in the
/// outermost loop, so in 1D it is (N,0), (N-1,1), ..., (0,N).
#[derive(Clone, Debug)]
pub struct BernsteinBasis {
    dim: usize,
    degree: usize,
    indices: Vec<Vec<usize>>,
    lookup: HashMap<Vec<usize>, usize>,
}

impl BernsteinBasis {
    /// Enumerate the degree-`degree` basis on a `dim`-simplex.
    pub fn new(dim: usize, degree: usize) -> Self {
        let mut indices = Vec::new();
        let mut tail = vec![0; dim];
        enumerate(dim, degree, &mut tail, &mut indices);

        let lookup = indices
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();

        Self {
            dim,
            degree,
            indices,
            lookup,
        }
    }

    /// Simplex dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of basis functions.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Always false: a basis has at least one function.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Multi-index of basis function `i`.
    pub fn multi_index(&self, i: usize) -> &[usize] {
        &self.indices[i]
    }

    /// Position of a multi-index, if it belongs to this degree.
    pub fn index_of(&self, alpha: &[usize]) -> Option<usize> {
        self.lookup.get(alpha).copied()
    }

    /// Barycentric coordinates α/N of the domain point of function `i`.
    pub fn domain_point(&self, i: usize) -> Vec<f64> {
        let n = self.degree.max(1) as f64;
        self.indices[i].iter().map(|&a| a as f64 / n).collect()
    }

    /// Evaluate every basis function at barycentric point `lambda`.
    pub fn evaluate(&self, lambda: &[f64]) -> Vec<f64> {
        self.indices
            .iter()
            .map(|alpha| {
                let mut value = multinomial(self.degree, alpha);
                for (&l, &a) in lambda.iter().zip(alpha) {
                    value *= l.powi(a as i32);
                }
                value
            })
            .collect()
    }
}

fn enumerate(k: usize, remaining: usize, tail: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
    if k == 0 {
        let mut alpha = Vec::with_capacity(tail.len() + 1);
        alpha.push(remaining);
        alpha.extend_from_slice(tail);
        out.push(alpha);
        return;
    }
    for v in 0..=remaining {
        tail[k - 1] = v;
        enumerate(k - 1, remaining - v, tail, out);
    }
}

/// n!
pub fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Multinomial coefficient n!/(α_0! ... α_d!).
pub fn multinomial(n: usize, alpha: &[usize]) -> f64 {
    alpha.iter().fold(factorial(n), |acc, &a| acc / factorial(a))
}

/// Barycentric coordinates of a reference-simplex point.
pub fn barycentric(r: &[f64]) -> Vec<f64> {
    let mut lambda = Vec::with_capacity(r.len() + 1);
    let tail: Vec<f64> = r.iter().map(|&rk| 0.5 * (1.0 + rk)).collect();
    lambda.push(1.0 - tail.iter().sum::<f64>());
    lambda.extend(tail);
    lambda
}

/// Mixed-degree Bernstein mass matrix ∫_T B_α^m B_β^n over a simplex of
/// measure `measure`.
///
/// Uses B_α^m B_β^n = C(m,α)C(n,β)/C(m+n,α+β) B_{α+β}^{m+n} and
/// ∫_T B_γ^k = |T| d! k!/(k+d)!.
pub fn mass_matrix(rows: &BernsteinBasis, cols: &BernsteinBasis, measure: f64) -> Mat<f64> {
    let d = rows.dim();
    let k = rows.degree() + cols.degree();
    let integral = measure * factorial(d) * factorial(k) / factorial(k + d);

    let mut m = Mat::zeros(rows.len(), cols.len());
    let mut sum = vec![0; d + 1];
    for i in 0..rows.len() {
        let a = rows.multi_index(i);
        let ca = multinomial(rows.degree(), a);
        for j in 0..cols.len() {
            let b = cols.multi_index(j);
            for (s, (&ai, &bi)) in sum.iter_mut().zip(a.iter().zip(b)) {
                *s = ai + bi;
            }
            let cb = multinomial(cols.degree(), b);
            m[(i, j)] = integral * ca * cb / multinomial(k, &sum);
        }
    }
    m
}

/// Degree elevation matrix from degree `n` to `n + 1`.
///
/// c'_γ = Σ_i γ_i/(n+1) c_{γ-e_i}, at most d+1 non-zeros per row.
pub fn elevation_matrix(dim: usize, n: usize) -> Mat<f64> {
    let coarse = BernsteinBasis::new(dim, n);
    let fine = BernsteinBasis::new(dim, n + 1);
    let mut e = Mat::zeros(fine.len(), coarse.len());

    let mut shifted = vec![0; dim + 1];
    for row in 0..fine.len() {
        let gamma = fine.multi_index(row);
        for i in 0..=dim {
            if gamma[i] == 0 {
                continue;
            }
            shifted.copy_from_slice(gamma);
            shifted[i] -= 1;
            if let Some(col) = coarse.index_of(&shifted) {
                e[(row, col)] += gamma[i] as f64 / (n + 1) as f64;
            }
        }
    }
    e
}

/// Derivative with respect to reference coordinate `axis`, as a degree-`n`
/// to degree-`n` operator on Bernstein coefficients.
///
/// ∂/∂r_k = (n/2) E_{n-1→n} (S_{k+1} - S_0) where S_i picks c_{γ+e_i}.
pub fn derivative_matrix(dim: usize, n: usize, axis: usize) -> Mat<f64> {
    let basis = BernsteinBasis::new(dim, n);
    if n == 0 {
        return Mat::zeros(1, 1);
    }
    let lower = BernsteinBasis::new(dim, n - 1);

    let mut diff = Mat::zeros(lower.len(), basis.len());
    let mut shifted = vec![0; dim + 1];
    for row in 0..lower.len() {
        let gamma = lower.multi_index(row);
        for (i, sign) in [(axis + 1, 1.0), (0, -1.0)] {
            shifted.copy_from_slice(gamma);
            shifted[i] += 1;
            if let Some(col) = basis.index_of(&shifted) {
                diff[(row, col)] += sign * 0.5 * n as f64;
            }
        }
    }

    matmul(&elevation_matrix(dim, n - 1), &diff)
}

/// Dense product a * b.
pub fn matmul(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    let mut c = Mat::zeros(a.nrows(), b.ncols());
    for i in 0..a.nrows() {
        for k in 0..a.ncols() {
            let aik = a[(i, k)];
            if aik == 0.0 {
                continue;
            }
            for j in 0..b.ncols() {
                c[(i, j)] += aik * b[(k, j)];
            }
        }
    }
    c
}

/// Transpose of a dense matrix.
pub fn transpose(a: &Mat<f64>) -> Mat<f64> {
    let mut t = Mat::zeros(a.ncols(), a.nrows());
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            t[(j, i)] = a[(i, j)];
        }
    }
    t
}

/// Solve A X = B with a partial-pivot LU.
///
/// The solution is accepted only if it is finite and the residual
/// ‖A X - B‖_∞ stays within `RESIDUAL_TOL` (‖A‖_∞ ‖X‖_∞ + ‖B‖_∞).
///
/// # Arguments
/// * `a` - Square system matrix
/// * `b` - Right-hand sides, one per column
/// * `what` - Operator name reported if the solve fails
pub fn solve(a: &Mat<f64>, b: &Mat<f64>, what: &str) -> Result<Mat<f64>> {
    if a.nrows() != a.ncols() || a.nrows() != b.nrows() {
        return Err(MrabError::dimension_mismatch(
            format!("{}x{} system", a.nrows(), a.nrows()),
            format!("{}x{} with {} rhs rows", a.nrows(), a.ncols(), b.nrows()),
        ));
    }
    let lu = a.as_ref().partial_piv_lu();
    let x = lu.solve(b);

    for j in 0..x.ncols() {
        for i in 0..x.nrows() {
            if !x[(i, j)].is_finite() {
                return Err(MrabError::SingularOperator(what.to_string()));
            }
        }
    }

    let ax = matmul(a, &x);
    let err = (0..b.nrows())
        .map(|i| (0..b.ncols()).map(|j| (ax[(i, j)] - b[(i, j)]).abs()).sum::<f64>())
        .fold(0.0, f64::max);
    let scale = inf_norm(a) * inf_norm(&x) + inf_norm(b);
    if err > RESIDUAL_TOL * scale.max(f64::MIN_POSITIVE) {
        log::warn!("{} solve residual {:.3e} (scale {:.3e})", what, err, scale);
        return Err(MrabError::SingularOperator(format!(
            "{what}: residual {err:.3e}"
        )));
    }
    Ok(x)
}

/// Relative residual accepted by [`solve`].
pub const RESIDUAL_TOL: f64 = 1e-10;

/// Maximum absolute row sum.
pub fn inf_norm(a: &Mat<f64>) -> f64 {
    (0..a.nrows())
        .map(|i| (0..a.ncols()).map(|j| a[(i, j)].abs()).sum::<f64>())
        .fold(0.0, f64::max)
}

/// Inverse of a square matrix.
pub fn inverse(a: &Mat<f64>, what: &str) -> Result<Mat<f64>> {
    let n = a.nrows();
    let mut identity = Mat::zeros(n, n);
    for i in 0..n {
        identity[(i, i)] = 1.0;
    }
    solve(a, &identity, what)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_basis_sizes() {
        assert_eq!(BernsteinBasis::new(1, 4).len(), 5);
        assert_eq!(BernsteinBasis::new(2, 3).len(), 10);
        assert_eq!(BernsteinBasis::new(3, 2).len(), 10);
    }

    #[test]
    fn test_edge_ordering() {
        let b = BernsteinBasis::new(1, 2);
        assert_eq!(b.multi_index(0), &[2, 0]);
        assert_eq!(b.multi_index(1), &[1, 1]);
        assert_eq!(b.multi_index(2), &[0, 2]);
    }

    #[test]
    fn test_partition_of_unity() {
        let lambda = barycentric(&[-0.3, 0.1]);
        for n in 1..=5 {
            let values = BernsteinBasis::new(2, n).evaluate(&lambda);
            let sum: f64 = values.iter().sum();
            assert!((sum - 1.0).abs() < TOL, "degree {}: sum={}", n, sum);
        }
    }

    #[test]
    fn test_mass_matrix_total() {
        // Σ_ij M_ij = ∫ 1 = |T|
        for (dim, measure) in [(1, 2.0), (2, 2.0), (3, 4.0 / 3.0)] {
            let b = BernsteinBasis::new(dim, 3);
            let m = mass_matrix(&b, &b, measure);
            let mut total = 0.0;
            for i in 0..m.nrows() {
                for j in 0..m.ncols() {
                    total += m[(i, j)];
                }
            }
            assert!((total - measure).abs() < TOL, "dim {}: {}", dim, total);
        }
    }

    #[test]
    fn test_elevation_preserves_values() {
        let n = 3;
        let coarse = BernsteinBasis::new(2, n);
        let fine = BernsteinBasis::new(2, n + 1);
        let e = elevation_matrix(2, n);

        let c: Vec<f64> = (0..coarse.len()).map(|i| (i as f64 * 0.37).sin()).collect();
        let lambda = barycentric(&[0.2, -0.5]);
        let bc = coarse.evaluate(&lambda);
        let bf = fine.evaluate(&lambda);

        let value: f64 = c.iter().zip(&bc).map(|(a, b)| a * b).sum();
        let mut elevated = 0.0;
        for row in 0..fine.len() {
            let mut cf = 0.0;
            for col in 0..coarse.len() {
                cf += e[(row, col)] * c[col];
            }
            elevated += cf * bf[row];
        }
        assert!((value - elevated).abs() < TOL);
    }

    #[test]
    fn test_derivative_of_linear_function() {
        // f = r in Bernstein form: c_α = 2 α_1/N - 1
        let n = 3;
        let basis = BernsteinBasis::new(2, n);
        let c: Vec<f64> = (0..basis.len())
            .map(|i| 2.0 * basis.domain_point(i)[1] - 1.0)
            .collect();
        let dr = derivative_matrix(2, n, 0);
        let ds = derivative_matrix(2, n, 1);
        for i in 0..basis.len() {
            let mut fr = 0.0;
            let mut fs = 0.0;
            for j in 0..basis.len() {
                fr += dr[(i, j)] * c[j];
                fs += ds[(i, j)] * c[j];
            }
            assert!((fr - 1.0).abs() < TOL);
            assert!(fs.abs() < TOL);
        }
    }

    #[test]
    fn test_solve_rejects_singular_system() {
        let mut a = Mat::zeros(3, 3);
        for j in 0..3 {
            a[(0, j)] = 1.0;
            a[(1, j)] = 2.0;
            a[(2, j)] = j as f64;
        }
        assert!(inverse(&a, "rank two").is_err());
    }

    #[test]
    fn test_inverse() {
        let b = BernsteinBasis::new(2, 2);
        let m = mass_matrix(&b, &b, 2.0);
        let minv = inverse(&m, "mass").unwrap();
        let prod = matmul(&m, &minv);
        for i in 0..b.len() {
            for j in 0..b.len() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((prod[(i, j)] - expected).abs() < 1e-10);
            }
        }
    }
}
