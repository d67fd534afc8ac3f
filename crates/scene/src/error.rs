use skirmish_render::UploadError;

use crate::config::ConfigError;
use crate::lifecycle::LifecycleState;

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("resource creation failed: {0}")]
    Resource(#[from] UploadError),
    #[error("invalid scene transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
    #[error("{operation} requires state {expected:?}, scene is {actual:?}")]
    WrongState {
        operation: &'static str,
        expected: LifecycleState,
        actual: LifecycleState,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
