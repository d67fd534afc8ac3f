//! Entity Registry: authoritative set of scene objects for one scene.
//!
//! # Invariants
//! - Iteration order is insertion order; deterministic for replay and tests.
//! - An inactive entity is invisible to animation, interaction and picking
//!   from the moment it is deactivated.
//! - Selection never names an inactive or removed entity.
//! - Only the registry flips liveness flags, so the selection rule above
//!   cannot be bypassed.

pub mod entity;
pub mod registry;
pub mod terrain;

pub use entity::{
    AnimateContext, BillboardKind, BillboardState, BulletState, ContactMode, EnemyState, Entity,
    EntityKind, EntityState, Lifecycle, PlayerState,
};
pub use registry::{Registry, RegistryEvent};
pub use terrain::HeightField;
