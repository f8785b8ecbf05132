//! Two-dimensional Boltzmann/BGK (BNS) system.
//!
//! Six fields q1..q6 carry density, scaled momenta and the second moments
//! of a truncated Hermite expansion. With s = sqrt(RT):
//!
//! ∂q/∂t + s (A_x ∂q/∂x + A_y ∂q/∂y) = R(q)
//!
//! where A_x couples (q1,q2), (q2,q5) and (q3,q4), A_y couples (q1,q3),
//! (q3,q6) and (q2,q4), and the BGK relaxation R acts on q4..q6:
//!
//! R4 = -τ⁻¹ (q4 - q2 q3 / q1)
//! R5 = -τ⁻¹ (q5 - q2² / (√2 q1))
//! R6 = -τ⁻¹ (q6 - q3² / (√2 q1))
//!
//! The flux is Lax-Friedrichs type with penalty λ₂ times the fastest speed
//! s√3.

use std::f64::consts::SQRT_2;

use super::traits::WavePhysics;
use crate::mesh::PhysicalBoundary;
use crate::types::Dimension;

const N_FIELDS: usize = 6;

/// BGK flow parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BgkConfig {
    /// sqrt(RT), the lattice speed
    pub sqrt_rt: f64,
    /// Inverse relaxation time
    pub tau_inv: f64,
}

impl Default for BgkConfig {
    fn default() -> Self {
        Self {
            sqrt_rt: 1.0,
            tau_inv: 1.0,
        }
    }
}

impl BgkConfig {
    /// Parameters from Mach and Reynolds numbers with unit reference
    /// velocity and length: sqrt(RT) = 1/(√3 Ma), τ⁻¹ = RT Re.
    pub fn from_mach_reynolds(mach: f64, reynolds: f64) -> Self {
        let sqrt_rt = 1.0 / (3f64.sqrt() * mach);
        Self {
            sqrt_rt,
            tau_inv: sqrt_rt * sqrt_rt * reynolds,
        }
    }
}

/// 2D Boltzmann/BGK equations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoltzmannBgk2D {
    config: BgkConfig,
}

impl BoltzmannBgk2D {
    /// Create with flow parameters.
    pub fn new(config: BgkConfig) -> Self {
        Self { config }
    }

    /// Flow parameters.
    pub fn config(&self) -> &BgkConfig {
        &self.config
    }

    /// s (A_x n_x + A_y n_y) q
    #[inline]
    fn normal_flux(&self, q: &[f64], n: &[f64; 3], out: &mut [f64; N_FIELDS]) {
        let s = self.config.sqrt_rt;
        let (nx, ny) = (n[0], n[1]);
        out[0] = s * (nx * q[1] + ny * q[2]);
        out[1] = s * (nx * (q[0] + SQRT_2 * q[4]) + ny * q[3]);
        out[2] = s * (nx * q[3] + ny * (q[0] + SQRT_2 * q[5]));
        out[3] = s * (nx * q[2] + ny * q[1]);
        out[4] = s * nx * SQRT_2 * q[1];
        out[5] = s * ny * SQRT_2 * q[2];
    }
}

impl Default for BoltzmannBgk2D {
    fn default() -> Self {
        Self::new(BgkConfig::default())
    }
}

impl WavePhysics for BoltzmannBgk2D {
    fn name(&self) -> &'static str {
        "Boltzmann BGK 2D"
    }

    fn dim(&self) -> Dimension {
        Dimension::Two
    }

    fn n_fields(&self) -> usize {
        N_FIELDS
    }

    fn field_names(&self) -> &'static [&'static str] {
        &["q1", "q2", "q3", "q4", "q5", "q6"]
    }

    #[inline]
    fn compute_flux(
        &self,
        q_m: &[f64],
        q_p: &[f64],
        normal: &[f64; 3],
        lambda2: f64,
        out: &mut [f64],
    ) {
        let mut dq = [0.0; N_FIELDS];
        for (k, d) in dq.iter_mut().enumerate() {
            *d = q_p[k] - q_m[k];
        }
        let mut an_dq = [0.0; N_FIELDS];
        self.normal_flux(&dq, normal, &mut an_dq);

        let penalty = lambda2 * self.max_wave_speed();
        for k in 0..N_FIELDS {
            out[k] = -0.5 * an_dq[k] + penalty * dq[k];
        }
    }

    /// Wall: reflect the normal momentum, keep everything else.
    ///
    /// Plane wave: impose the quiescent far-field state q = (1, 0, ..., 0).
    fn boundary_state(
        &self,
        boundary: PhysicalBoundary,
        _t: f64,
        _x: &[f64; 3],
        normal: &[f64; 3],
        q_m: &[f64],
        q_p: &mut [f64],
    ) {
        match boundary {
            PhysicalBoundary::PlaneWave => {
                q_p[..N_FIELDS].fill(0.0);
                q_p[0] = 1.0;
            }
            PhysicalBoundary::Wall | PhysicalBoundary::Custom(_) => {
                q_p[..N_FIELDS].copy_from_slice(&q_m[..N_FIELDS]);
                let mn = q_m[1] * normal[0] + q_m[2] * normal[1];
                q_p[1] -= 2.0 * mn * normal[0];
                q_p[2] -= 2.0 * mn * normal[1];
            }
        }
    }

    #[inline]
    fn volume_rhs(&self, _q: &[f64], grad: &[[f64; 3]], rhs: &mut [f64]) {
        let s = self.config.sqrt_rt;
        rhs[0] = -s * (grad[1][0] + grad[2][1]);
        rhs[1] = -s * (grad[0][0] + SQRT_2 * grad[4][0] + grad[3][1]);
        rhs[2] = -s * (grad[3][0] + grad[0][1] + SQRT_2 * grad[5][1]);
        rhs[3] = -s * (grad[2][0] + grad[1][1]);
        rhs[4] = -s * SQRT_2 * grad[1][0];
        rhs[5] = -s * SQRT_2 * grad[2][1];
    }

    fn has_relaxation(&self) -> bool {
        self.config.tau_inv != 0.0
    }

    fn relaxation(&self, q: &[f64], out: &mut [f64]) {
        out[..N_FIELDS].fill(0.0);
        let rho = q[0];
        if rho <= 0.0 {
            // no equilibrium for a vacuum state
            return;
        }
        let tau_inv = self.config.tau_inv;
        out[3] = -tau_inv * (q[3] - q[1] * q[2] / rho);
        out[4] = -tau_inv * (q[4] - q[1] * q[1] / (SQRT_2 * rho));
        out[5] = -tau_inv * (q[5] - q[2] * q[2] / (SQRT_2 * rho));
    }

    fn max_wave_speed(&self) -> f64 {
        self.config.sqrt_rt * 3f64.sqrt()
    }
}
