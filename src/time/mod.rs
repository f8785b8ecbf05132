//! Time integration methods.
//!
//! - [`history`]: shift-indexed three-generation RHS ring ([`ShiftRing`])
//! - [`adams_bashforth`]: AB1/AB2/AB3 weights in history-slot order
//! - [`mrab`]: the multi-rate integrator driving the solver kernels

pub mod adams_bashforth;
pub mod history;
pub mod mrab;

pub use adams_bashforth::AdamsBashforth;
pub use history::{N_GENERATIONS, ShiftRing};
pub use mrab::MrabIntegrator;
