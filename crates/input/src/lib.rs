//! Input handling: raw mouse/keyboard events become scene actions, and the
//! cursor resolves to a picked entity.
//!
//! # Invariants
//! - Scenes consume `Action`s, never raw events.
//! - Picking only considers active, pickable entities; a miss clears the
//!   selection.

pub mod action;
pub mod event;
pub mod picking;

pub use action::{Action, InputState};
pub use event::{Key, KeyEvent, MouseButton, MouseEvent};
pub use picking::{PICK_EPSILON, PickHit, PickingResolver, nearest_hit};
