//! Linear acoustics.
//!
//! ∂u_a/∂t = -∂p/∂x_a
//! ∂p/∂t   = -c² ∇·u
//!
//! with fields (u, v, p) in 2D and (u, v, w, p) in 3D. The c² factor of the
//! pressure equation is applied by the update kernel when a variable wave
//! speed is active; the physics itself is written for c = 1.
//!
//! The numerical flux is centred with an upwind-type penalty:
//!
//! dp* = [p]/2 - λ₂ n·[u]
//! du_a* = [u_a]/2 - λ₂ n_a [p]
//!
//! where [·] = (·)⁺ - (·)⁻, giving the jumps -n_a dp* for u_a and
//! -Σ n_a du_a* for p. λ₂ = 1/2 is the upwind flux.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use super::traits::{PmlPhysics, SourceFields, WavePhysics};
use crate::mesh::PhysicalBoundary;
use crate::types::Dimension;

/// Angular frequency of the plane-wave boundary forcing.
const PLANE_WAVE_OMEGA: f64 = 10.0 * PI;

/// Linear acoustics in 2D or 3D.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Acoustics {
    dim: Dimension,
}

impl Acoustics {
    /// Acoustics on triangles or tetrahedra.
    pub fn new(dim: Dimension) -> Self {
        Self { dim }
    }

    /// 2D acoustics (u, v, p).
    pub fn two_d() -> Self {
        Self::new(Dimension::Two)
    }

    /// 3D acoustics (u, v, w, p).
    pub fn three_d() -> Self {
        Self::new(Dimension::Three)
    }

    /// Index of the pressure field.
    #[inline]
    pub fn pressure(&self) -> usize {
        self.dim.n_dims()
    }

    /// Unit propagation direction of the plane-wave forcing (diagonal).
    fn plane_wave_direction(&self) -> [f64; 3] {
        match self.dim {
            Dimension::Two => [FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0],
            Dimension::Three => {
                let c = 1.0 / 3f64.sqrt();
                [c, c, c]
            }
        }
    }

    #[inline]
    fn jumps(&self, q_m: &[f64], q_p: &[f64], normal: &[f64; 3], lambda2: f64) -> (f64, [f64; 3]) {
        let d = self.dim.n_dims();
        let p = self.pressure();
        let dp = q_p[p] - q_m[p];

        let mut ndu = 0.0;
        for a in 0..d {
            ndu += normal[a] * (q_p[a] - q_m[a]);
        }

        let mut du_s = [0.0; 3];
        for a in 0..d {
            du_s[a] = 0.5 * (q_p[a] - q_m[a]) - lambda2 * normal[a] * dp;
        }
        (0.5 * dp - lambda2 * ndu, du_s)
    }
}

impl WavePhysics for Acoustics {
    fn name(&self) -> &'static str {
        match self.dim {
            Dimension::Two => "Acoustics 2D",
            Dimension::Three => "Acoustics 3D",
        }
    }

    fn dim(&self) -> Dimension {
        self.dim
    }

    fn n_fields(&self) -> usize {
        self.dim.n_dims() + 1
    }

    fn field_names(&self) -> &'static [&'static str] {
        match self.dim {
            Dimension::Two => &["u", "v", "p"],
            Dimension::Three => &["u", "v", "w", "p"],
        }
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
        let d = self.dim.n_dims();
        let (dp_s, du_s) = self.jumps(q_m, q_p, normal, lambda2);

        let mut div = 0.0;
        for a in 0..d {
            out[a] = -normal[a] * dp_s;
            div += normal[a] * du_s[a];
        }
        out[self.pressure()] = -div;
    }

    /// Wall: u⁺ = -u⁻, p⁺ = p⁻.
    ///
    /// Plane wave: the wall state minus twice the incident velocity
    /// d cos(ω(t - d·x)). Custom codes reflect like walls.
    fn boundary_state(
        &self,
        boundary: PhysicalBoundary,
        t: f64,
        x: &[f64; 3],
        _normal: &[f64; 3],
        q_m: &[f64],
        q_p: &mut [f64],
    ) {
        let d = self.dim.n_dims();
        let p = self.pressure();
        for a in 0..d {
            q_p[a] = -q_m[a];
        }
        q_p[p] = q_m[p];

        if boundary == PhysicalBoundary::PlaneWave {
            let dir = self.plane_wave_direction();
            let phase: f64 = (0..d).map(|a| x[a] * dir[a]).sum();
            let wave = (PLANE_WAVE_OMEGA * (t - phase)).cos();
            for a in 0..d {
                q_p[a] -= 2.0 * dir[a] * wave;
            }
        }
    }

    #[inline]
    fn volume_rhs(&self, _q: &[f64], grad: &[[f64; 3]], rhs: &mut [f64]) {
        let d = self.dim.n_dims();
        let p = self.pressure();
        let mut div = 0.0;
        for a in 0..d {
            rhs[a] = -grad[p][a];
            div += grad[a][a];
        }
        rhs[p] = -div;
    }

    fn wave_speed_field(&self) -> Option<usize> {
        Some(self.pressure())
    }

    fn max_wave_speed(&self) -> f64 {
        1.0
    }

    fn pml(&self) -> Option<&dyn PmlPhysics> {
        Some(self)
    }

    fn source_fields(&self) -> Option<SourceFields> {
        Some(SourceFields {
            velocity: match self.dim {
                Dimension::Two => &[0, 1],
                Dimension::Three => &[0, 1, 2],
            },
            pressure: self.pressure(),
        })
    }
}

/// Split pressure p = Σ p_a with
///
/// ∂u_a/∂t = -∂p/∂x_a - σ_a u_a
/// ∂p_a/∂t = -∂u_a/∂x_a - σ_a p_a
impl PmlPhysics for Acoustics {
    fn n_pml_fields(&self) -> usize {
        self.dim.n_dims()
    }

    fn init_split(&self, q: &[f64], pml: &mut [f64]) {
        let d = self.dim.n_dims();
        let share = q[self.pressure()] / d as f64;
        pml[..d].fill(share);
    }

    #[inline]
    fn pml_volume_rhs(&self, grad: &[[f64; 3]], rhs_q: &mut [f64], rhs_pml: &mut [f64]) {
        let d = self.dim.n_dims();
        let p = self.pressure();
        let mut div = 0.0;
        for a in 0..d {
            rhs_q[a] = -grad[p][a];
            rhs_pml[a] = -grad[a][a];
            div += grad[a][a];
        }
        rhs_q[p] = -div;
    }

    #[inline]
    fn pml_flux(
        &self,
        q_m: &[f64],
        q_p: &[f64],
        normal: &[f64; 3],
        lambda2: f64,
        flux_q: &mut [f64],
        flux_pml: &mut [f64],
    ) {
        let d = self.dim.n_dims();
        let (dp_s, du_s) = self.jumps(q_m, q_p, normal, lambda2);

        let mut div = 0.0;
        for a in 0..d {
            flux_q[a] = -normal[a] * dp_s;
            flux_pml[a] = -normal[a] * du_s[a];
            div += flux_pml[a];
        }
        flux_q[self.pressure()] = div;
    }

    #[inline]
    fn pml_damping(
        &self,
        sigma: &[f64; 3],
        q: &[f64],
        pml: &[f64],
        out_q: &mut [f64],
        out_pml: &mut [f64],
    ) {
        let d = self.dim.n_dims();
        for a in 0..d {
            out_q[a] = -sigma[a] * q[a];
            out_pml[a] = -sigma[a] * pml[a];
        }
        out_q[self.pressure()] = 0.0;
    }

    fn combine_split(&self, pml: &[f64], q: &mut [f64]) {
        let d = self.dim.n_dims();
        q[self.pressure()] = pml[..d].iter().sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_jump_gives_zero_flux() {
        let physics = Acoustics::three_d();
        let q = [0.3, -1.2, 0.7, 2.5];
        let mut out = [1.0; 4];
        for normal in [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.6, 0.0, 0.8]] {
            physics.compute_flux(&q, &q, &normal, 0.5, &mut out);
            assert!(out.iter().all(|&v| v == 0.0), "{:?}", out);
        }
    }

    #[test]
    fn test_pressure_jump_upwind_flux() {
        // [p] = 1 across a face with normal x
        let physics = Acoustics::two_d();
        let mut out = [0.0; 3];
        physics.compute_flux(&[0.0, 0.0, 0.0], &[0.0, 0.0, 1.0], &[1.0, 0.0, 0.0], 0.5, &mut out);
        assert_relative_eq!(out[0], -0.5);
        assert_relative_eq!(out[1], 0.0);
        assert_relative_eq!(out[2], 0.5);
    }

    #[test]
    fn test_wall_reflects_velocity() {
        let physics = Acoustics::two_d();
        let mut q_p = [0.0; 3];
        physics.boundary_state(
            PhysicalBoundary::Wall,
            0.0,
            &[0.0; 3],
            &[1.0, 0.0, 0.0],
            &[1.0, 2.0, 3.0],
            &mut q_p,
        );
        assert_eq!(q_p, [-1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_plane_wave_forcing() {
        let physics = Acoustics::two_d();
        let mut q_p = [0.0; 3];
        // at t = 0, x = 0 the incident wave is d
        physics.boundary_state(
            PhysicalBoundary::PlaneWave,
            0.0,
            &[0.0; 3],
            &[1.0, 0.0, 0.0],
            &[0.0, 0.0, 0.5],
            &mut q_p,
        );
        assert_relative_eq!(q_p[0], -2.0 * FRAC_1_SQRT_2, epsilon = 1e-14);
        assert_relative_eq!(q_p[1], -2.0 * FRAC_1_SQRT_2, epsilon = 1e-14);
        assert_eq!(q_p[2], 0.5);
    }

    #[test]
    fn test_volume_rhs() {
        let physics = Acoustics::two_d();
        // u = x, v = 2y, p = 3x - y
        let grad = [[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [3.0, -1.0, 0.0]];
        let mut rhs = [0.0; 3];
        physics.volume_rhs(&[0.0; 3], &grad, &mut rhs);
        assert_eq!(rhs, [-3.0, 1.0, -3.0]);
    }

    #[test]
    fn test_split_flux_sums_to_regular_flux() {
        let physics = Acoustics::three_d();
        let q_m = [0.1, 0.2, -0.3, 1.0];
        let q_p = [-0.4, 0.0, 0.5, 0.2];
        let n = [0.0, 0.6, 0.8];
        let mut regular = [0.0; 4];
        physics.compute_flux(&q_m, &q_p, &n, 0.5, &mut regular);

        let mut flux_q = [0.0; 4];
        let mut flux_pml = [0.0; 3];
        physics.pml_flux(&q_m, &q_p, &n, 0.5, &mut flux_q, &mut flux_pml);
        for a in 0..4 {
            assert_relative_eq!(flux_q[a], regular[a], epsilon = 1e-15);
        }
        assert_relative_eq!(flux_pml.iter().sum::<f64>(), regular[3], epsilon = 1e-15);
    }

    #[test]
    fn test_split_roundtrip() {
        let physics = Acoustics::two_d();
        let mut q = [0.0, 0.0, 4.0];
        let mut pml = [0.0; 2];
        physics.init_split(&q, &mut pml);
        assert_eq!(pml, [2.0, 2.0]);
        q[2] = 0.0;
        physics.combine_split(&pml, &mut q);
        assert_eq!(q[2], 4.0);
    }
}
