//! Scene Lifecycle Controller: title and game scenes, the per-frame update
//! order, and switching between scenes.
//!
//! A game frame runs, in order: held input, entity animation, the
//! interaction checks, camera follow, light buffer rebuild, then frame
//! capture for the renderer.
//!
//! # Invariants
//! - Lifecycle order is Uninitialized -> Built -> Active -> Releasing ->
//!   Destroyed; any other transition is an error.
//! - A requested scene is fully built before it replaces the current one,
//!   and the replacement happens between frames.
//! - Releasing frees light resources first, then object resources, then any
//!   outstanding staging buffers.
//! - A staging buffer is released only once the fence it was tagged with
//!   has completed.

mod config;
mod director;
mod error;
mod game;
mod lifecycle;
mod scene;
mod title;

pub use config::{
    BulletConfig, CameraConfig, ConfigError, DecorConfig, EnemyConfig, LightingConfig, PlayerConfig, SceneConfig,
    SceneFlags, TerrainConfig,
};
pub use director::SceneDirector;
pub use error::SceneError;
pub use game::GameScene;
pub use lifecycle::LifecycleState;
pub use scene::{Scene, SceneCapability, SceneKind};
pub use title::TitleScene;
