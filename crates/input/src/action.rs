use std::collections::BTreeSet;

use glam::{Vec2, Vec3};

use crate::event::{Key, KeyEvent, MouseButton, MouseEvent};

/// A high-level action produced from raw input.
///
/// Scenes consume actions, never raw input events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Pick whatever is under the cursor.
    Pick { x: f32, y: f32 },
    /// Fire from the player.
    Fire,
    /// Rotate the camera by a cursor delta in pixels.
    Look { dx: f32, dy: f32 },
    ToggleFreeCamera,
    ToggleSolidTerrain,
    ToggleCursor,
    /// Accept the focused menu item.
    Confirm,
    ReturnToTitle,
    /// Input with no binding.
    Noop,
}

/// Held keys and cursor position between frames.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: BTreeSet<Key>,
    cursor: Vec2,
    dragging: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Track the key and map presses to actions. Releases only update state.
    pub fn key(&mut self, event: KeyEvent) -> Action {
        if !event.pressed {
            self.held.remove(&event.key);
            return Action::Noop;
        }
        // Repeats of a held key are not new presses.
        if !self.held.insert(event.key) {
            return Action::Noop;
        }
        match event.key {
            Key::F1 => Action::ToggleFreeCamera,
            Key::F2 => Action::ToggleSolidTerrain,
            Key::F3 => Action::ToggleCursor,
            Key::Escape => Action::ReturnToTitle,
            Key::Enter => Action::Confirm,
            Key::Space => Action::Fire,
            _ => Action::Noop,
        }
    }

    /// Left click picks while the cursor is active and fires otherwise.
    /// Right-drag looks around.
    pub fn mouse(&mut self, event: MouseEvent, cursor_active: bool) -> Action {
        match event {
            MouseEvent::Moved { x, y } => {
                let delta = Vec2::new(x, y) - self.cursor;
                self.cursor = Vec2::new(x, y);
                if self.dragging {
                    Action::Look {
                        dx: delta.x,
                        dy: delta.y,
                    }
                } else {
                    Action::Noop
                }
            }
            MouseEvent::Pressed { button, x, y } => {
                self.cursor = Vec2::new(x, y);
                match button {
                    MouseButton::Left if cursor_active => Action::Pick { x, y },
                    MouseButton::Left => Action::Fire,
                    MouseButton::Right => {
                        self.dragging = true;
                        Action::Noop
                    }
                    MouseButton::Middle => Action::Noop,
                }
            }
            MouseEvent::Released { button, x, y } => {
                self.cursor = Vec2::new(x, y);
                if button == MouseButton::Right {
                    self.dragging = false;
                }
                Action::Noop
            }
        }
    }

    /// Held movement keys as a local direction: x right, y up, z forward.
    /// Not normalized.
    pub fn movement(&self) -> Vec3 {
        let axis = |pos: Key, neg: Key| -> f32 {
            match (self.is_held(pos), self.is_held(neg)) {
                (true, false) => 1.0,
                (false, true) => -1.0,
                _ => 0.0,
            }
        };
        Vec3::new(axis(Key::D, Key::A), axis(Key::E, Key::Q), axis(Key::W, Key::S))
    }

    /// Forget held keys, e.g. on focus loss or scene change.
    pub fn clear(&mut self) {
        self.held.clear();
        self.dragging = false;
    }
}
