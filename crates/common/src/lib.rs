//! Shared types for the skirmish scene layer.
//!
//! # Invariants
//! - `EntityId` values are never reused within one registry.
//! - Bounding volumes are authored in local space and converted to world
//!   space through a `Transform` before any overlap or ray test.

pub mod geometry;
pub mod rng;
pub mod types;

pub use geometry::{BoundingVolume, Ray};
pub use rng::SceneRng;
pub use types::{EntityId, Transform};
