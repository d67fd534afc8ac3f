//! Developer tooling: read-only inspection of running scenes.
//!
//! # Invariants
//! - Inspection never mutates the scene it looks at.

mod inspector;

pub use inspector::{EntityInfo, LightInfo, SceneInspector, SceneSummary};
