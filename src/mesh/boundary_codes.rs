//! Boundary codes for element faces.
//!
//! Positive codes are physical boundaries handed to the physics boundary
//! function. Codes -10 and -11 are reserved for the two sides of a
//! source-injection patch interface and never reach the physics.

/// Physical boundary kinds understood by the physics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhysicalBoundary {
    /// Rigid wall, velocity reflecting (code 1)
    Wall,
    /// Plane-wave forcing (code 2)
    PlaneWave,
    /// User-defined code > 2
    Custom(i32),
}

/// Code attached to every element face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BoundaryCode {
    /// Interior face (has a neighbour, not a source interface)
    #[default]
    Interior,
    /// Physical boundary
    Physical(PhysicalBoundary),
    /// Source patch face whose owner lies inside the patch (-10)
    SourceInterior,
    /// Source patch face whose owner lies outside the patch (-11)
    SourceExterior,
}

impl BoundaryCode {
    /// Rigid wall.
    pub const WALL: Self = BoundaryCode::Physical(PhysicalBoundary::Wall);

    /// Plane-wave forcing.
    pub const PLANE_WAVE: Self = BoundaryCode::Physical(PhysicalBoundary::PlaneWave);

    /// Decode the integer convention (0 interior, 1 wall, 2 plane wave,
    /// -10/-11 source interfaces, other positive codes custom).
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::WALL,
            2 => Self::PLANE_WAVE,
            -10 => BoundaryCode::SourceInterior,
            -11 => BoundaryCode::SourceExterior,
            c if c > 2 => BoundaryCode::Physical(PhysicalBoundary::Custom(c)),
            _ => BoundaryCode::Interior,
        }
    }

    /// Integer code.
    pub fn code(self) -> i32 {
        match self {
            BoundaryCode::Interior => 0,
            BoundaryCode::Physical(PhysicalBoundary::Wall) => 1,
            BoundaryCode::Physical(PhysicalBoundary::PlaneWave) => 2,
            BoundaryCode::Physical(PhysicalBoundary::Custom(c)) => c,
            BoundaryCode::SourceInterior => -10,
            BoundaryCode::SourceExterior => -11,
        }
    }

    /// Physical boundary to hand to the physics, if any.
    #[inline]
    pub fn physical(self) -> Option<PhysicalBoundary> {
        match self {
            BoundaryCode::Physical(b) => Some(b),
            _ => None,
        }
    }

    /// Sign with which the incident field is added on a source interface.
    #[inline]
    pub fn source_sign(self) -> Option<f64> {
        match self {
            BoundaryCode::SourceInterior => Some(1.0),
            BoundaryCode::SourceExterior => Some(-1.0),
            _ => None,
        }
    }
}
