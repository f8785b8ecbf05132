//! Error types for solver setup.
//!
//! Time stepping itself never fails: numerical edge cases (boundary faces,
//! unmapped traces, the source singularity) are absorbed by explicit fallback
//! branches. Only setup validation produces errors.

use thiserror::Error;

/// Errors that can occur while building operators, meshes and solver state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MrabError {
    /// Polynomial degree outside the supported range.
    #[error("Invalid polynomial degree {degree}: expected 1..={max}")]
    InvalidDegree { degree: usize, max: usize },

    /// Minimum squared wave speed is not positive.
    #[error("Invalid wave speed: c^2 = {c2} at element {element}")]
    InvalidWaveSpeed { element: usize, c2: f64 },

    /// Array or table size does not match the mesh.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Mesh with no local elements.
    #[error("Mesh has no elements")]
    EmptyMesh,

    /// Malformed element connectivity.
    #[error("Invalid connectivity: {0}")]
    InvalidConnectivity(String),

    /// Non-positive or non-finite time step.
    #[error("Invalid time step: {0}")]
    InvalidTimeStep(f64),

    /// Degenerate operator during setup.
    #[error("Singular operator: {0}")]
    SingularOperator(String),

    /// PML elements present but the physics has no split-field form.
    #[error("Physics '{0}' does not support PML elements")]
    PmlUnsupported(&'static str),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MrabError {
    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MrabError>;
