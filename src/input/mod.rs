//! Stacked input handlers
//!
//! Routes per-frame key and axis samples to independently configured
//! handlers arranged in a priority stack:
//! - Handlers own three key tables (press-start, held, press-end) and axes
//! - The stack polls only the keys its handlers listen to
//! - Hard and soft blocking decide how far down the stack a key travels
//! - Listeners can be rebound live, waiting across frames for the next key
//!
//! # Architecture
//!
//! ```text
//! Host samples (InputSource) → InputStack (merged key list)
//!                                   ↓
//!                         per key, top → bottom
//!                                   ↓
//!                      Handler tables → Listener callbacks
//!                                   ↓
//!                   dirty handlers → caches recomputed lazily
//! ```
//!
//! # Usage
//!
//! ```
//! use std::rc::Rc;
//! use keystack::input::{Action, FrameInput, HandlerTemplate, InputStack, KeyCode, KeyEvent, MemoryStore};
//!
//! let mut stack = InputStack::new(Rc::new(MemoryStore::new()));
//! stack.register(
//!     HandlerTemplate::new("Movement")
//!         .with_listener(KeyEvent::PressStart, "Jump", Some(KeyCode::Space), None),
//! );
//! stack.push("Movement");
//! if let Some(handler) = stack.handler_mut("Movement") {
//!     handler.add_callback("Jump", Action::new(|| println!("jump")), KeyEvent::PressStart);
//! }
//!
//! // Each frame
//! let mut input = FrameInput::new();
//! input.press(KeyCode::Space);
//! stack.dispatch(&input);
//! stack.end_frame();
//! input.advance_frame();
//! ```

mod axis;
mod handler;
mod key;
mod listener;
mod registry;
mod remap;
mod source;
mod stack;
mod store;

// Re-export public API
pub use axis::Axis;
pub use handler::{Handler, HandlerPolicy, HandlerTemplate, KeySelector, RebindOutcome};
pub use key::{KeyCode, KeyEvent, KeySlot, UnknownKey};
pub use listener::{Action, Listener, ListenerDef};
pub use registry::HandlerRegistry;
pub use remap::{RemapId, RemapStatus};
pub use source::{ButtonState, CursorPolicy, CursorSink, FrameInput, InputSource};
pub use stack::{ActionRef, InputStack, PreservedStack};
pub use store::{HandlerConfig, HandlerStore, JsonFileStore, MemoryStore, SharedStore, StoreError};
