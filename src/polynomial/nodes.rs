//! Gauss-Legendre nodes and weights.
//!
//! The n Gauss-Legendre nodes are the roots of P_n(x) on (-1, 1); the rule
//! integrates polynomials of degree 2n-1 exactly. They are the 1D building
//! block of the collapsed simplex cubature.

use super::legendre::legendre_and_derivative;
use std::f64::consts::PI;

/// Compute `n` Gauss-Legendre nodes and weights, nodes ascending.
///
/// Newton iteration from the Chebyshev-like guess
/// x_i = -cos(π (4i + 3) / (4n + 2)).
/// Weights are w_i = 2 / ((1 - x_i²) P'_n(x_i)²).
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    for i in 0..n {
        let mut x = -(PI * (4 * i + 3) as f64 / (4 * n + 2) as f64).cos();
        for _ in 0..100 {
            let (p, dp) = legendre_and_derivative(n, x);
            let update = p / dp;
            x -= update;
            if update.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre_and_derivative(n, x);
        nodes.push(x);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    (nodes, weights)
}
