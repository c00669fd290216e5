//! Raw per-frame input samples and the cursor sink
//!
//! The stack never talks to a window system directly: hosts implement
//! [`InputSource`] over whatever they poll, and [`CursorSink`] to receive the
//! cursor policy. [`FrameInput`] is a ready-made source fed by key events.

use std::collections::HashMap;

use enum_map::EnumMap;
use serde::{Deserialize, Serialize};

use super::key::{KeyCode, KeyEvent};

/// Per-frame key and axis samples from the host
pub trait InputSource {
    /// Key went down this frame
    fn is_key_down(&self, key: KeyCode) -> bool;

    /// Key is down (including the frame it went down)
    fn is_key_held(&self, key: KeyCode) -> bool;

    /// Key went up this frame
    fn is_key_up(&self, key: KeyCode) -> bool;

    /// Current value of a physical axis
    fn axis_value(&self, source: &str) -> f32;

    /// Whether `key` is in the state `event` listens for
    fn matches(&self, key: KeyCode, event: KeyEvent) -> bool {
        match event {
            KeyEvent::PressStart => self.is_key_down(key),
            KeyEvent::Held => self.is_key_held(key),
            KeyEvent::PressEnd => self.is_key_up(key),
        }
    }
}

/// Button press state with edge detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Released,
    /// Pressed this frame (edge)
    JustPressed,
    /// Held down (multiple frames)
    Pressed,
    /// Released this frame (edge)
    JustReleased,
}

impl ButtonState {
    /// Advance state for next frame (transitions edges to steady states)
    pub fn advance(self) -> Self {
        match self {
            Self::JustPressed => Self::Pressed,
            Self::JustReleased => Self::Released,
            state => state,
        }
    }

    pub fn is_down(self) -> bool {
        matches!(self, Self::JustPressed | Self::Pressed)
    }

    pub fn is_just_pressed(self) -> bool {
        matches!(self, Self::JustPressed)
    }

    pub fn is_just_released(self) -> bool {
        matches!(self, Self::JustReleased)
    }
}

/// Key and axis state for one frame, fed by host key events
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    keys: EnumMap<KeyCode, ButtonState>,
    axes: HashMap<String, f32>,
}

impl FrameInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press. Repeats while already down are ignored.
    pub fn press(&mut self, key: KeyCode) {
        if !self.keys[key].is_down() {
            self.keys[key] = ButtonState::JustPressed;
        }
    }

    /// Record a key release
    pub fn release(&mut self, key: KeyCode) {
        if self.keys[key].is_down() {
            self.keys[key] = ButtonState::JustReleased;
        }
    }

    pub fn set_axis(&mut self, source: impl Into<String>, value: f32) {
        self.axes.insert(source.into(), value);
    }

    pub fn key_state(&self, key: KeyCode) -> ButtonState {
        self.keys[key]
    }

    /// Advance all key states for next frame
    pub fn advance_frame(&mut self) {
        for state in self.keys.values_mut() {
            *state = state.advance();
        }
    }
}

impl InputSource for FrameInput {
    fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys[key].is_just_pressed()
    }

    fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys[key].is_down()
    }

    fn is_key_up(&self, key: KeyCode) -> bool {
        self.keys[key].is_just_released()
    }

    fn axis_value(&self, source: &str) -> f32 {
        self.axes.get(source).copied().unwrap_or(0.0)
    }
}

/// Cursor lock requested by the handler on top of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Cursor moves freely
    #[default]
    Free,
    /// Cursor locked to the window center and hidden
    Locked,
    /// Cursor kept inside the window
    Confined,
}

impl CursorPolicy {
    pub fn is_visible(self) -> bool {
        self != CursorPolicy::Locked
    }
}

/// Host-side receiver of the cursor policy
pub trait CursorSink {
    fn apply_cursor(&mut self, policy: CursorPolicy, visible: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_hold_release_cycle() {
        let mut input = FrameInput::new();
        input.press(KeyCode::Space);
        assert!(input.is_key_down(KeyCode::Space));
        assert!(input.is_key_held(KeyCode::Space));
        assert!(!input.is_key_up(KeyCode::Space));

        input.advance_frame();
        assert!(!input.is_key_down(KeyCode::Space));
        assert!(input.is_key_held(KeyCode::Space));

        // OS key repeat must not produce a second edge
        input.press(KeyCode::Space);
        assert_eq!(input.key_state(KeyCode::Space), ButtonState::Pressed);

        input.release(KeyCode::Space);
        assert!(input.is_key_up(KeyCode::Space));
        assert!(!input.is_key_held(KeyCode::Space));

        input.advance_frame();
        assert_eq!(input.key_state(KeyCode::Space), ButtonState::Released);
    }

    #[test]
    fn test_matches_follows_event_class() {
        let mut input = FrameInput::new();
        input.press(KeyCode::A);
        assert!(input.matches(KeyCode::A, KeyEvent::PressStart));
        assert!(input.matches(KeyCode::A, KeyEvent::Held));
        assert!(!input.matches(KeyCode::A, KeyEvent::PressEnd));
    }

    #[test]
    fn test_unknown_axis_reads_zero() {
        let mut input = FrameInput::new();
        input.set_axis("Mouse X", 0.25);
        assert_eq!(input.axis_value("Mouse X"), 0.25);
        assert_eq!(input.axis_value("Mouse Y"), 0.0);
    }

    #[test]
    fn test_locked_cursor_is_hidden() {
        assert!(!CursorPolicy::Locked.is_visible());
        assert!(CursorPolicy::Confined.is_visible());
        assert!(CursorPolicy::Free.is_visible());
    }
}
