//! Adams-Bashforth weights on the shifted RHS history.
//!
//! With step h and RHS samples f(t), f(t - h), f(t - 2h), the update over
//! [t + a h, t + b h] is
//!
//! q(t + b h) = q(t + a h) + h Σ_j g_j f(t - j h),   g_j = ∫_a^b L_j(s) ds
//!
//! where L_j are the Lagrange polynomials on the nodes s = 0, -1, -2.
//! A full step (a = 0, b = 1) of order 3 gives the familiar 23/12, -4/3,
//! 5/12. Intervals inside the step give the intermediate states needed by
//! multi-rate trace updates.
//!
//! Weights are returned in storage-slot order, `[w(slot 0), w(slot 1),
//! w(slot 2)]`, ready for the update kernel.

use super::history::N_GENERATIONS;
use crate::error::{MrabError, Result};

/// Constant-rate Adams-Bashforth scheme of order 1..=3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdamsBashforth {
    order: usize,
}

impl AdamsBashforth {
    /// Highest supported order.
    pub const MAX_ORDER: usize = N_GENERATIONS;

    /// Scheme of the given order.
    pub fn new(order: usize) -> Result<Self> {
        if order == 0 || order > Self::MAX_ORDER {
            return Err(MrabError::InvalidConfig(format!(
                "Adams-Bashforth order must be in 1..={}, got {}",
                Self::MAX_ORDER,
                order
            )));
        }
        Ok(Self { order })
    }

    /// Startup order after `n_updates` completed updates: 1, 2, then 3.
    pub fn startup(n_updates: usize) -> Self {
        Self {
            order: (n_updates + 1).min(Self::MAX_ORDER),
        }
    }

    /// Order of the scheme.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Weights by generation age (newest first) for the interval [a, b]
    /// in units of the step.
    pub fn integrate(&self, a: f64, b: f64) -> [f64; 3] {
        let fa = self.antiderivatives(a);
        let fb = self.antiderivatives(b);
        [fb[0] - fa[0], fb[1] - fa[1], fb[2] - fa[2]]
    }

    fn antiderivatives(&self, s: f64) -> [f64; 3] {
        let s2 = s * s;
        let s3 = s2 * s;
        match self.order {
            1 => [s, 0.0, 0.0],
            2 => [0.5 * s2 + s, -0.5 * s2, 0.0],
            _ => [
                s3 / 6.0 + 0.75 * s2 + s,
                -s3 / 3.0 - s2,
                s3 / 6.0 + 0.25 * s2,
            ],
        }
    }

    /// Full-step weights in slot order, for a history whose newest RHS sits
    /// in the current slot (before the shift advances).
    pub fn full_step(&self) -> [f64; 3] {
        let g = self.integrate(0.0, 1.0);
        [g[0], g[2], g[1]]
    }

    /// Slot-ordered weights taking the state at the end of a step back to
    /// fraction `tau` of it, for a history that has already been rotated.
    ///
    /// `tau = 1` yields zero weights.
    pub fn rewind(&self, tau: f64) -> [f64; 3] {
        let g = self.integrate(1.0, tau);
        [g[2], g[1], g[0]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classic_coefficients() {
        let ab3 = AdamsBashforth::new(3).unwrap().integrate(0.0, 1.0);
        assert_relative_eq!(ab3[0], 23.0 / 12.0, epsilon = 1e-15);
        assert_relative_eq!(ab3[1], -4.0 / 3.0, epsilon = 1e-15);
        assert_relative_eq!(ab3[2], 5.0 / 12.0, epsilon = 1e-15);

        let ab2 = AdamsBashforth::new(2).unwrap().integrate(0.0, 1.0);
        assert_eq!(ab2, [1.5, -0.5, 0.0]);
        assert_eq!(AdamsBashforth::new(1).unwrap().integrate(0.0, 1.0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_weights_sum_to_interval_length() {
        for order in 1..=3 {
            let ab = AdamsBashforth::new(order).unwrap();
            let g = ab.integrate(0.25, 0.75);
            assert_relative_eq!(g.iter().sum::<f64>(), 0.5, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_startup_ramp() {
        assert_eq!(AdamsBashforth::startup(0).order(), 1);
        assert_eq!(AdamsBashforth::startup(1).order(), 2);
        assert_eq!(AdamsBashforth::startup(2).order(), 3);
        assert_eq!(AdamsBashforth::startup(10).order(), 3);
        assert!(AdamsBashforth::new(4).is_err());
    }

    #[test]
    fn test_slot_ordering() {
        let ab = AdamsBashforth::new(3).unwrap();
        let g = ab.integrate(0.0, 1.0);
        assert_eq!(ab.full_step(), [g[0], g[2], g[1]]);
        assert_eq!(ab.rewind(1.0), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rewind_undoes_the_tail_of_a_step() {
        // full step minus the rewound tail equals integrating up to tau
        let ab = AdamsBashforth::new(3).unwrap();
        let tau = 0.5;
        let full = ab.integrate(0.0, 1.0);
        let head = ab.integrate(0.0, tau);
        let back = ab.rewind(tau);
        // rotated slots hold (oldest, middle, newest)
        let back_by_age = [back[2], back[1], back[0]];
        for j in 0..3 {
            assert_relative_eq!(full[j] + back_by_age[j], head[j], epsilon = 1e-15);
        }
    }
}
