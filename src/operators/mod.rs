//! Bernstein-Bezier reference operators.
//!
//! Solution coefficients are stored in the Bernstein basis. All operators
//! here act on reference elements and are assembled once per degree:
//! - [`bernstein`]: basis enumeration, mass, elevation, derivatives
//! - [`trace`]: face-trace raise/lower between neighbouring degrees
//! - [`lift`]: sparse two-stage surface lift
//! - [`cubature`]: interpolation to and projection from cubature points
//! - [`modal`]: nodal-to-Bernstein conversion
//! - [`tables`]: per-degree bundle used by the kernels

pub mod bernstein;
pub mod cubature;
pub mod lift;
pub mod modal;
pub mod tables;
pub mod trace;

pub use bernstein::BernsteinBasis;
pub use cubature::{Cubature, CubatureOps};
pub use lift::{BbLift, SparseRows};
pub use modal::BbVandermonde;
pub use tables::{DegreeOps, ReferenceTables};
pub use trace::{TraceLower, TraceProjector, TraceRaise, TraceTransfer};
