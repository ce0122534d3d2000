//! Shared value types for the submap fusion workspace.

pub mod geometry;
pub mod transform;

pub use geometry::*;
pub use transform::*;
