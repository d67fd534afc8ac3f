/// Keys the scene layer reacts to. Anything else arrives as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
    Space,
    Enter,
    Escape,
    F1,
    F2,
    F3,
    Other(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self { key, pressed: true }
    }

    pub fn release(key: Key) -> Self {
        Self { key, pressed: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Cursor coordinates are pixels from the top-left of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEvent {
    Moved { x: f32, y: f32 },
    Pressed { button: MouseButton, x: f32, y: f32 },
    Released { button: MouseButton, x: f32, y: f32 },
}
