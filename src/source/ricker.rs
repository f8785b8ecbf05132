//! Ricker-pulse point source.
//!
//! ricker(t, f)     = (1 - 2π²f²t²) exp(-π²f²t²)
//! int_ricker(t, f) = t exp(-π²f²t²)
//!
//! The incident field of a point source at x0 with reference speed c is,
//! for r = |x - x0| and retarded time τ = t - r/c,
//!
//! p   = ricker(τ) / (4π r)
//! u_i = d_i (int_ricker(τ)/r + ricker(τ)/c) / (4π r²)
//!
//! with d = x - x0. The radius is floored at [`MIN_RADIUS`].

use std::f64::consts::PI;

use crate::physics::SourceFields;

/// Smallest radius used when evaluating the incident field.
pub const MIN_RADIUS: f64 = 1e-9;

/// Ricker wavelet.
#[inline]
pub fn ricker(t: f64, f: f64) -> f64 {
    let a = (PI * f * t).powi(2);
    (1.0 - 2.0 * a) * (-a).exp()
}

/// Time antiderivative companion of [`ricker`] used for the velocity.
#[inline]
pub fn int_ricker(t: f64, f: f64) -> f64 {
    let a = (PI * f * t).powi(2);
    t * (-a).exp()
}

/// Analytic point source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointSource {
    /// Source position
    pub position: [f64; 3],
    /// Time shift added to the evaluation time
    pub t0: f64,
    /// Centre frequency
    pub frequency: f64,
    /// Reference wave speed
    pub c: f64,
}

impl PointSource {
    /// Create a source with unit wave speed.
    pub fn new(position: [f64; 3], frequency: f64, t0: f64) -> Self {
        Self {
            position,
            t0,
            frequency,
            c: 1.0,
        }
    }

    /// Set the reference wave speed.
    pub fn with_wave_speed(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    /// Write the incident field at `x` and time `t` (shifted by `t0`).
    ///
    /// Only the fields named in `fields` are written.
    pub fn incident(&self, x: &[f64; 3], t: f64, fields: &SourceFields, out: &mut [f64]) {
        let d = fields.velocity.len();
        let mut disp = [0.0; 3];
        for (k, dk) in disp.iter_mut().enumerate().take(d) {
            *dk = x[k] - self.position[k];
        }
        let r = disp[..d]
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
            .max(MIN_RADIUS);

        let tau = t + self.t0 - r / self.c;
        let rk = ricker(tau, self.frequency);
        let irk = int_ricker(tau, self.frequency);

        out[fields.pressure] = rk / (4.0 * PI * r);
        let vel = (irk / r + rk / self.c) / (4.0 * PI * r * r);
        for (&fld, dk) in fields.velocity.iter().zip(disp) {
            out[fld] = dk * vel;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FIELDS_2D: SourceFields = SourceFields {
        velocity: &[0, 1],
        pressure: 2,
    };

    #[test]
    fn test_ricker_peak_and_zero_crossing() {
        assert_eq!(ricker(0.0, 4.0), 1.0);
        // zero at π² f² t² = 1/2
        let t = 1.0 / (PI * 4.0 * 2f64.sqrt());
        assert!(ricker(t, 4.0).abs() < 1e-14);
        assert_eq!(int_ricker(0.0, 4.0), 0.0);
    }

    #[test]
    fn test_incident_pressure() {
        let src = PointSource::new([0.0, 0.0, 0.0], 4.0, 0.0);
        let mut out = [0.0; 3];
        src.incident(&[0.5, 0.0, 0.0], 1.0, &FIELDS_2D, &mut out);
        let expected = ricker(0.5, 4.0) / (4.0 * PI * 0.5);
        assert_relative_eq!(out[2], expected, epsilon = 1e-15);
        // velocity points along the displacement
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn test_radius_floor_keeps_values_finite() {
        let src = PointSource::new([0.1, 0.2, 0.0], 4.0, -0.1);
        let mut out = [0.0; 3];
        src.incident(&[0.1, 0.2, 0.0], 0.3, &FIELDS_2D, &mut out);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_time_shift() {
        let src = PointSource::new([0.0; 3], 4.0, -0.1);
        let unshifted = PointSource::new([0.0; 3], 4.0, 0.0);
        let (mut a, mut b) = ([0.0; 3], [0.0; 3]);
        src.incident(&[0.3, 0.4, 0.0], 1.0, &FIELDS_2D, &mut a);
        unshifted.incident(&[0.3, 0.4, 0.0], 0.9, &FIELDS_2D, &mut b);
        for k in 0..3 {
            assert_relative_eq!(a[k], b[k], epsilon = 1e-15);
        }
    }
}
