//! Live key remapping
//!
//! A remap session waits across frames for the next held key and rebinds one
//! slot of a listener to it. It is a small state machine driven by
//! [`InputStack::tick_remaps`](super::stack::InputStack::tick_remaps): each
//! tick either finds no key and keeps waiting, or resolves and finishes.

use std::fmt;

use tracing::{debug, info, warn};

use super::handler::RebindOutcome;
use super::key::{KeyCode, KeySlot};
use super::registry::HandlerRegistry;
use super::source::InputSource;

/// Identifies a running remap session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RemapId(pub(crate) u64);

/// How a remap session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapStatus {
    /// A key was captured and the listener rebound
    Resolved {
        old: Option<KeyCode>,
        new: KeyCode,
        outcome: RebindOutcome,
    },
    /// No key was held within the configured number of frames
    TimedOut,
    /// Cancelled by the caller
    Cancelled,
    /// The handler or listener went away while waiting
    Abandoned,
}

pub(crate) struct RemapSession {
    pub(crate) id: RemapId,
    pub(crate) handler: String,
    pub(crate) listener: String,
    slot: KeySlot,
    on_complete: Option<Box<dyn FnOnce(KeyCode)>>,
    frames_waited: u32,
    timeout_frames: Option<u32>,
}

impl fmt::Debug for RemapSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemapSession")
            .field("id", &self.id)
            .field("handler", &self.handler)
            .field("listener", &self.listener)
            .field("slot", &self.slot)
            .field("frames_waited", &self.frames_waited)
            .finish_non_exhaustive()
    }
}

impl RemapSession {
    pub(crate) fn new(
        id: RemapId,
        handler: impl Into<String>,
        listener: impl Into<String>,
        slot: KeySlot,
        on_complete: Option<Box<dyn FnOnce(KeyCode)>>,
        timeout_frames: Option<u32>,
    ) -> Self {
        Self {
            id,
            handler: handler.into(),
            listener: listener.into(),
            slot,
            on_complete,
            frames_waited: 0,
            timeout_frames,
        }
    }

    pub(crate) fn targets(&self, handler: &str, listener: &str) -> bool {
        self.handler == handler && self.listener == listener
    }

    /// Advance one frame. `None` while still waiting for a key.
    pub(crate) fn poll<I: InputSource + ?Sized>(
        &mut self,
        registry: &mut HandlerRegistry,
        input: &I,
    ) -> Option<RemapStatus> {
        let Some(handler) = registry.get_mut(&self.handler) else {
            warn!(handler = %self.handler, listener = %self.listener, "Remap target handler is gone");
            return Some(RemapStatus::Abandoned);
        };
        let Some(listener) = handler.listener_by_name(&self.listener) else {
            warn!(handler = %self.handler, listener = %self.listener, "Remap target listener is gone");
            return Some(RemapStatus::Abandoned);
        };
        let old = listener.slot(self.slot);

        let Some(new) = KeyCode::all().find(|key| input.is_key_held(*key)) else {
            self.frames_waited += 1;
            if self.timeout_frames.is_some_and(|limit| self.frames_waited >= limit) {
                info!(handler = %self.handler, listener = %self.listener, frames = self.frames_waited, "Remap timed out");
                return Some(RemapStatus::TimedOut);
            }
            return None;
        };

        debug!(handler = %self.handler, listener = %self.listener, %new, "Remap captured key");
        let outcome = handler.rebind_slot(&self.listener, self.slot, new);
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(new);
        }
        Some(RemapStatus::Resolved { old, new, outcome })
    }
}
