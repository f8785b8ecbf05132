//! 1D polynomial tools.
//!
//! This module provides:
//! - Legendre polynomials and their derivatives
//! - Gauss-Legendre nodes and weights

mod legendre;
mod nodes;

pub use legendre::legendre_and_derivative;
pub use nodes::gauss_legendre;
