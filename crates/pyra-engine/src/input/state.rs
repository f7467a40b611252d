use std::collections::HashSet;

use super::types::{InputEvent, Key, KeyState, PointerMoveEvent};

/// Raw input state of a single surface.
///
/// Holds the set of held keys, the close flag, and mouse movement accumulated
/// since the consumer last read it. Events are applied synchronously while
/// the surface polls.
#[derive(Debug, Default)]
pub struct InputState {
    /// Key that raises the close flag when pressed.
    close_key: Option<Key>,

    should_close: bool,

    keys_down: HashSet<Key>,

    /// Movement since the last `take_mouse_delta_*`; y is positive upwards.
    mouse_delta: (f32, f32),

    /// Last cursor position; `None` until the first cursor event.
    last_cursor: Option<(f32, f32)>,

    /// Set by the first raw motion event. From then on the delta comes from
    /// raw motion only and cursor positions just update `last_cursor`.
    relative_motion: bool,
}

impl InputState {
    pub fn new(close_key: Option<Key>) -> Self {
        Self {
            close_key,
            ..Self::default()
        }
    }

    /// Applies a platform-agnostic input event.
    pub fn apply_event(&mut self, ev: &InputEvent) {
        match ev {
            InputEvent::Key { key, state, .. } => {
                match state {
                    KeyState::Pressed => {
                        self.keys_down.insert(*key);
                        if self.close_key == Some(*key) {
                            self.should_close = true;
                        }
                    }
                    KeyState::Released => {
                        self.keys_down.remove(key);
                    }
                }
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                // The first position only establishes the baseline.
                let (last_x, last_y) = self.last_cursor.unwrap_or((*x, *y));
                if !self.relative_motion {
                    self.mouse_delta.0 += x - last_x;
                    self.mouse_delta.1 += last_y - y;
                }
                self.last_cursor = Some((*x, *y));
            }

            InputEvent::MouseMotion { dx, dy } => {
                self.relative_motion = true;
                self.mouse_delta.0 += dx;
                self.mouse_delta.1 -= dy;
            }

            InputEvent::Focused(focused) => {
                if !*focused {
                    // Avoids stuck keys when focus changes mid-press.
                    self.keys_down.clear();
                }
            }

            InputEvent::CloseRequested => {
                self.should_close = true;
            }
        }
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn should_close(&self) -> bool {
        self.should_close
    }

    pub fn request_close(&mut self) {
        self.should_close = true;
    }

    /// Returns horizontal movement since the previous call and resets it.
    pub fn take_mouse_delta_x(&mut self) -> f32 {
        std::mem::take(&mut self.mouse_delta.0)
    }

    /// Returns vertical movement since the previous call and resets it.
    pub fn take_mouse_delta_y(&mut self) -> f32 {
        std::mem::take(&mut self.mouse_delta.1)
    }

    pub fn last_cursor(&self) -> Option<(f32, f32)> {
        self.last_cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cursor_event_sets_baseline_only() {
        let mut input = InputState::default();
        input.apply_event(&InputEvent::pointer(100.0, 50.0));

        assert_eq!(input.last_cursor(), Some((100.0, 50.0)));
        assert_eq!(input.take_mouse_delta_x(), 0.0);
        assert_eq!(input.take_mouse_delta_y(), 0.0);
    }

    #[test]
    fn deltas_accumulate_then_drain() {
        let mut input = InputState::default();
        input.apply_event(&InputEvent::pointer(10.0, 10.0));
        input.apply_event(&InputEvent::pointer(13.0, 8.0));
        input.apply_event(&InputEvent::pointer(15.0, 9.0));

        assert_eq!(input.take_mouse_delta_x(), 5.0);
        assert_eq!(input.take_mouse_delta_x(), 0.0);
        // Upward movement is positive.
        assert_eq!(input.take_mouse_delta_y(), 1.0);
        assert_eq!(input.take_mouse_delta_y(), 0.0);
    }

    #[test]
    fn raw_motion_keeps_counting_at_the_window_edge() {
        let mut input = InputState::default();
        input.apply_event(&InputEvent::pointer(799.0, 300.0));
        input.apply_event(&InputEvent::motion(12.0, -4.0));
        // Cursor pinned at the edge while the mouse keeps moving.
        input.apply_event(&InputEvent::pointer(799.0, 300.0));
        input.apply_event(&InputEvent::motion(8.0, 2.0));
        input.apply_event(&InputEvent::pointer(780.0, 310.0));

        assert_eq!(input.take_mouse_delta_x(), 20.0);
        assert_eq!(input.take_mouse_delta_y(), 2.0);
        assert_eq!(input.last_cursor(), Some((780.0, 310.0)));
    }

    #[test]
    fn close_key_sets_flag() {
        let mut input = InputState::new(Some(Key::Escape));
        input.apply_event(&InputEvent::key(Key::Q, KeyState::Pressed));
        assert!(!input.should_close());

        input.apply_event(&InputEvent::key(Key::Escape, KeyState::Pressed));
        assert!(input.should_close());
    }

    #[test]
    fn key_tracking_and_focus_loss() {
        let mut input = InputState::default();
        input.apply_event(&InputEvent::key(Key::W, KeyState::Pressed));
        input.apply_event(&InputEvent::key(Key::Unknown(4000), KeyState::Pressed));
        assert!(input.key_down(Key::W));
        assert!(input.key_down(Key::Unknown(4000)));

        input.apply_event(&InputEvent::key(Key::W, KeyState::Released));
        assert!(!input.key_down(Key::W));

        input.apply_event(&InputEvent::Focused(false));
        assert!(!input.key_down(Key::Unknown(4000)));
    }

    #[test]
    fn window_close_request_sets_flag() {
        let mut input = InputState::new(None);
        input.apply_event(&InputEvent::key(Key::Escape, KeyState::Pressed));
        assert!(!input.should_close());

        input.apply_event(&InputEvent::CloseRequested);
        assert!(input.should_close());
    }
}
