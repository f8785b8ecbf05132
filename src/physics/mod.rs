//! Physics implementations for the MRAB engine.
//!
//! A physics is a small implementation of [`WavePhysics`] (and optionally
//! [`PmlPhysics`]); the volume, surface and update kernels are shared.
//!
//! # Example
//! ```
//! use mrab_dg::physics::{Acoustics, WavePhysics};
//!
//! let physics = Acoustics::two_d();
//! assert_eq!(physics.n_fields(), 3);
//! assert_eq!(physics.field_names(), &["u", "v", "p"]);
//! ```

mod acoustics;
mod boltzmann;
mod traits;

pub use acoustics::Acoustics;
pub use boltzmann::{BgkConfig, BoltzmannBgk2D};
pub use traits::{PmlPhysics, SourceFields, WavePhysics};
