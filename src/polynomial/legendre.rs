//! Legendre polynomial evaluation.
//!
//! Only used to locate Gauss-Legendre points; the solver basis itself is
//! Bernstein-Bezier.

/// Evaluate P_n(x) and P'_n(x) with the three-term recurrence.
///
/// (k+1) P_{k+1}(x) = (2k+1) x P_k(x) - k P_{k-1}(x)
///
/// The derivative uses P'_n = n (x P_n - P_{n-1}) / (x^2 - 1), which is only
/// evaluated at interior points by the callers in this crate.
pub fn legendre_and_derivative(n: usize, x: f64) -> (f64, f64) {
    if n == 0 {
        return (1.0, 0.0);
    }

    let mut p_prev = 1.0;
    let mut p_curr = x;
    for k in 1..n {
        let p_next = ((2 * k + 1) as f64 * x * p_curr - k as f64 * p_prev) / (k + 1) as f64;
        p_prev = p_curr;
        p_curr = p_next;
    }

    let denom = x * x - 1.0;
    let dp = if denom.abs() < 1e-14 {
        // P'_n(±1) = (±1)^{n+1} n(n+1)/2
        let sign = if x < 0.0 && n % 2 == 0 { -1.0 } else { 1.0 };
        sign * (n * (n + 1)) as f64 / 2.0
    } else {
        n as f64 * (x * p_curr - p_prev) / denom
    };

    (p_curr, dp)
}
