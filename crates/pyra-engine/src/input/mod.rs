//! Input subsystem.
//!
//! Public API is platform-agnostic. Window system backends translate their
//! events into `InputEvent`s, which the platform routes to the owning
//! surface's `InputState`.

pub(crate) mod platform;
mod state;
mod types;

pub use state::InputState;
pub use types::{InputEvent, Key, KeyState, PointerMoveEvent};
