//! Strongly-typed domain types for safer APIs.
//!
//! Newtype indices for elements and MRAB levels, plus the
//! [`Dimension`] descriptor that fixes node and face counts for triangles
//! and tetrahedra.
//!
//! # Example
//!
//! ```
//! use mrab_dg::types::{Dimension, ElementIndex};
//!
//! let dim = Dimension::Two;
//! assert_eq!(dim.np(2), 6);
//! assert_eq!(dim.nfp(2), 3);
//! assert_eq!(ElementIndex::new(7).get(), 7);
//! ```

mod dimension;
mod indices;

pub use dimension::Dimension;
pub use indices::{ElementIndex, LevelIndex};
