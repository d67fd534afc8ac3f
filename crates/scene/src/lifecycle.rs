use crate::error::SceneError;

/// Scene lifecycle: Uninitialized -> Built -> Active -> Releasing -> Destroyed.
///
/// A built scene that never became active (a queued scene discarded at
/// shutdown) may go straight to Releasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Built,
    Active,
    Releasing,
    Destroyed,
}

impl LifecycleState {
    pub fn can_transition_to(self, to: Self) -> bool {
        use LifecycleState::*;
        matches!(
            (self, to),
            (Uninitialized, Built)
                | (Built, Active)
                | (Built, Releasing)
                | (Active, Releasing)
                | (Releasing, Destroyed)
        )
    }

    /// Move to `to`, or report the rejected transition.
    pub fn advance(&mut self, to: Self) -> Result<(), SceneError> {
        if !self.can_transition_to(to) {
            return Err(SceneError::InvalidTransition { from: *self, to });
        }
        let from = *self;
        tracing::debug!(?from, ?to, "scene lifecycle");
        *self = to;
        Ok(())
    }

    /// Fail unless currently in `expected`.
    pub fn require(self, operation: &'static str, expected: Self) -> Result<(), SceneError> {
        if self == expected {
            Ok(())
        } else {
            Err(SceneError::WrongState {
                operation,
                expected,
                actual: self,
            })
        }
    }
}
