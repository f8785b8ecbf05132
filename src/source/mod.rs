//! Point-source injection and PML damping.
//!
//! - [`ricker`]: analytic Ricker point source
//! - [`patch`]: scattered-field patch setup and incident trace injection
//! - [`pml`]: damping profile of PML elements

pub mod patch;
pub mod pml;
pub mod ricker;

pub use patch::{SourceConfig, SourcePatch};
pub use pml::{BoundingBox, PmlAxes, PmlConfig, PmlProfile};
pub use ricker::{MIN_RADIUS, PointSource, int_ricker, ricker};
