//! Physical key codes and the event classes handlers listen for

use enum_map::Enum;
use serde::{Deserialize, Serialize};

/// Physical key code
///
/// Every variant is a representable key; [`KeyCode::all`] enumerates them in
/// declaration order, which is also the order a remap scan probes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, Serialize, Deserialize)]
pub enum KeyCode {
    // Common keys
    Space,
    Enter,
    Escape,
    Backspace,
    Tab,

    // Letters
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    // Numbers
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,

    // Function keys
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,

    // Arrows
    Left,
    Right,
    Up,
    Down,

    // Modifiers
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,

    // Navigation
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    // Punctuation
    Minus,
    Equal,
    Comma,
    Period,
    Slash,
    Backslash,
    Semicolon,
    Quote,
    Backquote,
    LeftBracket,
    RightBracket,

    // Mouse buttons
    Mouse0,
    Mouse1,
    Mouse2,
}

impl KeyCode {
    /// Iterates every representable key code in declaration order
    pub fn all() -> impl Iterator<Item = KeyCode> {
        (0..<KeyCode as Enum>::LENGTH).map(<KeyCode as Enum>::from_usize)
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A key name that matches no [`KeyCode`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key code '{0}'")]
pub struct UnknownKey(pub String);

impl std::str::FromStr for KeyCode {
    type Err = UnknownKey;

    /// Parses a key by its display name, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyCode::all()
            .find(|key| key.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

/// Event class a key table listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyEvent {
    /// Key went down this frame
    PressStart,
    /// Key is down (every frame while held)
    Held,
    /// Key went up this frame
    PressEnd,
}

impl KeyEvent {
    /// All event classes, in the order dispatch polls them
    pub const ALL: [KeyEvent; 3] = [KeyEvent::PressStart, KeyEvent::Held, KeyEvent::PressEnd];
}

/// Which of a listener's two key slots to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySlot {
    Positive,
    Alternative,
}

/// Convert from winit key code
///
/// Keys without a counterpart map to `None`.
#[cfg(feature = "winit")]
impl KeyCode {
    pub fn from_winit(key: winit::keyboard::KeyCode) -> Option<Self> {
        use winit::keyboard::KeyCode as WK;
        let key = match key {
            WK::Space => Self::Space,
            WK::Enter => Self::Enter,
            WK::Escape => Self::Escape,
            WK::Backspace => Self::Backspace,
            WK::Tab => Self::Tab,

            WK::KeyA => Self::A,
            WK::KeyB => Self::B,
            WK::KeyC => Self::C,
            WK::KeyD => Self::D,
            WK::KeyE => Self::E,
            WK::KeyF => Self::F,
            WK::KeyG => Self::G,
            WK::KeyH => Self::H,
            WK::KeyI => Self::I,
            WK::KeyJ => Self::J,
            WK::KeyK => Self::K,
            WK::KeyL => Self::L,
            WK::KeyM => Self::M,
            WK::KeyN => Self::N,
            WK::KeyO => Self::O,
            WK::KeyP => Self::P,
            WK::KeyQ => Self::Q,
            WK::KeyR => Self::R,
            WK::KeyS => Self::S,
            WK::KeyT => Self::T,
            WK::KeyU => Self::U,
            WK::KeyV => Self::V,
            WK::KeyW => Self::W,
            WK::KeyX => Self::X,
            WK::KeyY => Self::Y,
            WK::KeyZ => Self::Z,

            WK::Digit0 => Self::Num0,
            WK::Digit1 => Self::Num1,
            WK::Digit2 => Self::Num2,
            WK::Digit3 => Self::Num3,
            WK::Digit4 => Self::Num4,
            WK::Digit5 => Self::Num5,
            WK::Digit6 => Self::Num6,
            WK::Digit7 => Self::Num7,
            WK::Digit8 => Self::Num8,
            WK::Digit9 => Self::Num9,

            WK::F1 => Self::F1,
            WK::F2 => Self::F2,
            WK::F3 => Self::F3,
            WK::F4 => Self::F4,
            WK::F5 => Self::F5,
            WK::F6 => Self::F6,
            WK::F7 => Self::F7,
            WK::F8 => Self::F8,
            WK::F9 => Self::F9,
            WK::F10 => Self::F10,
            WK::F11 => Self::F11,
            WK::F12 => Self::F12,

            WK::ArrowLeft => Self::Left,
            WK::ArrowRight => Self::Right,
            WK::ArrowUp => Self::Up,
            WK::ArrowDown => Self::Down,

            WK::ShiftLeft => Self::LeftShift,
            WK::ShiftRight => Self::RightShift,
            WK::ControlLeft => Self::LeftCtrl,
            WK::ControlRight => Self::RightCtrl,
            WK::AltLeft => Self::LeftAlt,
            WK::AltRight => Self::RightAlt,

            WK::Insert => Self::Insert,
            WK::Delete => Self::Delete,
            WK::Home => Self::Home,
            WK::End => Self::End,
            WK::PageUp => Self::PageUp,
            WK::PageDown => Self::PageDown,

            WK::Minus => Self::Minus,
            WK::Equal => Self::Equal,
            WK::Comma => Self::Comma,
            WK::Period => Self::Period,
            WK::Slash => Self::Slash,
            WK::Backslash => Self::Backslash,
            WK::Semicolon => Self::Semicolon,
            WK::Quote => Self::Quote,
            WK::Backquote => Self::Backquote,
            WK::BracketLeft => Self::LeftBracket,
            WK::BracketRight => Self::RightBracket,

            _ => return None,
        };
        Some(key)
    }
}
