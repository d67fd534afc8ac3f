//! Spatial Interaction Engine: discrete, pairwise, per-frame outcomes.
//!
//! Four checks run in a fixed order, each observing the deactivations made
//! by the ones before it:
//! 1. player vs enemy (contact damage, consume or knock back, player death)
//! 2. enemy vs enemy (half-and-half separation)
//! 3. bullet vs enemy (first match in registry order, kills spawn an
//!    exploded-enemy billboard)
//! 4. bullet vs terrain (out of bounds, or under solid ground)
//!
//! # Invariants
//! - No compaction happens between checks; storage is compacted once after
//!   the fourth.
//! - An unordered enemy pair is resolved at most once per frame.
//! - Each kill spawns exactly one exploded-enemy billboard.
//! - The checks never fail.

mod checks;
mod engine;

pub use engine::{InteractionConfig, InteractionEngine, InteractionReport};
