//! Partition-boundary communication.

mod halo;

pub use halo::{HaloExchange, MirrorHalo, SerialHalo};
