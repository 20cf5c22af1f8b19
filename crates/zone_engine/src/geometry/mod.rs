//! Zone geometry
//!
//! Bounding primitives and the resolver that derives a zone's region from
//! its constituent bodies.
//!
//! # Module Organization
//!
//! - [`aabb`] - Axis-aligned bounds used for fast-path rejection
//! - [`obb`] - Oriented boxes for parts, cells and character bounds
//! - [`region`] - Region resolution and oversized-box decomposition

pub mod aabb;
pub mod obb;
pub mod region;

pub use aabb::AABB;
pub use obb::OrientedBox;
pub use region::{decompose, CellLimits, PartVolume, Region};
