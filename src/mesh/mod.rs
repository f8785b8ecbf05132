//! Simplex meshes, degree selection and MRAB level setup.
//!
//! Setup runs in this order:
//! 1. [`SimplexMesh`] from vertices and connectivity (or a [`builder`])
//! 2. [`assign_degrees`] picks and smooths per-element degrees
//! 3. [`MeshTopology`] attaches degrees and builds the face-node maps
//! 4. [`MrabLevels`] buckets elements by stable time step
//! 5. optionally [`repartition`] balances levels across ranks

pub mod boundary_codes;
pub mod builder;
pub mod degree;
pub mod levels;
pub mod partition;
pub mod simplex;
pub mod topology;

pub use boundary_codes::{BoundaryCode, PhysicalBoundary};
pub use builder::{BoxMesh, RectangleMesh};
pub use degree::{DegreeConfig, DegreeReport, assign_degrees, smooth_degrees};
pub use levels::{LevelConfig, LevelElements, MrabLevels, TimeSchedule};
pub use partition::{Partition, PartitionConfig, element_weights, repartition};
pub use simplex::{SimplexMesh, SurfaceGeometry, VolumeGeometry};
pub use topology::MeshTopology;
