//! # mrab-dg
//!
//! Multi-rate Adams-Bashforth time integration for high-order
//! discontinuous Galerkin discretizations of wave problems on unstructured
//! triangle and tetrahedron meshes.
//!
//! This crate provides:
//! - Bernstein-Bezier reference operators with a sparse two-stage lift
//! - Face-trace projection between neighbouring polynomial degrees
//! - Per-element degree assignment and MRAB level bucketing
//! - Shift-indexed RHS history and the MRAB update kernels
//! - Point-source injection on a scattered-field patch and PML damping
//! - Linear acoustics (2D/3D) and the 2D Boltzmann-BGK system
//!
//! # Example
//!
//! ```
//! use mrab_dg::mesh::{LevelConfig, MeshTopology, MrabLevels, RectangleMesh};
//! use mrab_dg::operators::ReferenceTables;
//! use mrab_dg::parallel::SerialHalo;
//! use mrab_dg::physics::Acoustics;
//! use mrab_dg::solver::SolverConfig;
//! use mrab_dg::time::MrabIntegrator;
//! use mrab_dg::types::Dimension;
//!
//! let tables = ReferenceTables::new(Dimension::Two, 2)?;
//! let mesh = RectangleMesh::new(0.0, 1.0, 0.0, 1.0, 4, 4).build()?;
//! let n_total = mesh.n_total();
//! let topo = MeshTopology::new(mesh, vec![2; n_total], &tables)?;
//! let e_to_dt = vec![1e-3; topo.n_elements()];
//! let levels = MrabLevels::build(topo.mesh(), &e_to_dt, &LevelConfig::default(), &mut SerialHalo)?;
//!
//! let physics = Acoustics::two_d();
//! let mut mrab = MrabIntegrator::new(
//!     &topo, &tables, &physics, levels, SolverConfig::default(), None, &SerialHalo,
//! )?;
//! mrab.set_initial(0.0, |x, q| {
//!     q.fill(0.0);
//!     q[2] = (-50.0 * ((x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2))).exp();
//! });
//! mrab.run(0.01, &mut SerialHalo)?;
//! assert!(mrab.norms().is_finite());
//! # Ok::<(), mrab_dg::MrabError>(())
//! ```

pub mod error;
pub mod mesh;
pub mod operators;
pub mod parallel;
pub mod physics;
pub mod polynomial;
pub mod solver;
pub mod source;
pub mod time;
pub mod types;

// Re-export main types for convenience
pub use error::{MrabError, Result};
pub use mesh::{
    BoundaryCode, BoxMesh, DegreeConfig, LevelConfig, MeshTopology, MrabLevels, PartitionConfig,
    RectangleMesh, SimplexMesh, assign_degrees, repartition,
};
pub use operators::ReferenceTables;
pub use parallel::{HaloExchange, MirrorHalo, SerialHalo};
pub use physics::{Acoustics, BgkConfig, BoltzmannBgk2D, PmlPhysics, WavePhysics};
pub use solver::{FieldNorms, SolverConfig, SolverState, WaveSpeed};
pub use source::{PmlConfig, SourceConfig, SourcePatch};
pub use time::{AdamsBashforth, MrabIntegrator, ShiftRing};
pub use types::{Dimension, ElementIndex, LevelIndex};
