//! Logical actions bound to physical keys

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::key::{KeyCode, KeySlot};

/// Callback handle subscribed to a listener
///
/// Handles compare by identity: a clone of a handle refers to the same
/// callback and can be used to unsubscribe it.
#[derive(Clone)]
pub struct Action(Rc<dyn Fn()>);

impl Action {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Run the callback
    pub fn call(&self) {
        (self.0)()
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Action {}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Persisted shape of a listener: its name and key slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerDef {
    pub name: String,
    #[serde(default)]
    pub positive: Option<KeyCode>,
    #[serde(default)]
    pub alternative: Option<KeyCode>,
}

impl ListenerDef {
    pub fn new(
        name: impl Into<String>,
        positive: Option<KeyCode>,
        alternative: Option<KeyCode>,
    ) -> Self {
        Self {
            name: name.into(),
            positive,
            alternative,
        }
    }
}

/// A logical action bound to up to two physical keys
#[derive(Debug, Clone)]
pub struct Listener {
    name: String,
    positive: Option<KeyCode>,
    alternative: Option<KeyCode>,
    /// Subscribed callbacks, in registration order
    callbacks: Vec<Action>,
    /// Set once the listener fired this frame (once-per-frame handlers only)
    invoked: bool,
    /// Synthesized by a raw key subscription this session
    raw: bool,
}

impl Listener {
    pub fn new(
        name: impl Into<String>,
        positive: Option<KeyCode>,
        alternative: Option<KeyCode>,
    ) -> Self {
        Self {
            name: name.into(),
            positive,
            alternative,
            callbacks: Vec::new(),
            invoked: false,
            raw: false,
        }
    }

    /// Listener synthesized for a raw key subscription, named after the key
    pub fn for_key(key: KeyCode) -> Self {
        Self {
            raw: true,
            ..Self::new(key.to_string(), Some(key), None)
        }
    }

    pub fn from_def(def: &ListenerDef) -> Self {
        Self::new(def.name.clone(), def.positive, def.alternative)
    }

    pub fn to_def(&self) -> ListenerDef {
        ListenerDef::new(self.name.clone(), self.positive, self.alternative)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn positive(&self) -> Option<KeyCode> {
        self.positive
    }

    pub fn alternative(&self) -> Option<KeyCode> {
        self.alternative
    }

    pub fn slot(&self, slot: KeySlot) -> Option<KeyCode> {
        match slot {
            KeySlot::Positive => self.positive,
            KeySlot::Alternative => self.alternative,
        }
    }

    pub fn set_slot(&mut self, slot: KeySlot, key: Option<KeyCode>) {
        match slot {
            KeySlot::Positive => self.positive = key,
            KeySlot::Alternative => self.alternative = key,
        }
    }

    /// Slot currently holding `key`, positive first
    pub fn slot_of(&self, key: KeyCode) -> Option<KeySlot> {
        if self.positive == Some(key) {
            Some(KeySlot::Positive)
        } else if self.alternative == Some(key) {
            Some(KeySlot::Alternative)
        } else {
            None
        }
    }

    /// Bound keys, positive first
    pub fn keys(&self) -> impl Iterator<Item = KeyCode> + '_ {
        self.positive.into_iter().chain(self.alternative)
    }

    /// True if the two listeners share at least one bound key
    pub fn shares_key_with(&self, other: &Listener) -> bool {
        self.keys().any(|k| other.slot_of(k).is_some())
    }

    /// Subscribe a callback. Returns false if this handle is already subscribed.
    pub fn add_callback(&mut self, action: Action) -> bool {
        if self.callbacks.contains(&action) {
            return false;
        }
        self.callbacks.push(action);
        true
    }

    /// Unsubscribe a callback. Returns false if it was not subscribed.
    pub fn remove_callback(&mut self, action: &Action) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|a| a != action);
        self.callbacks.len() != before
    }

    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.is_empty()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Created by [`Listener::for_key`] rather than loaded from a config
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// A raw key listener with nothing subscribed serves no purpose
    pub fn is_disposable(&self) -> bool {
        self.raw && self.callbacks.is_empty()
    }

    pub fn was_invoked(&self) -> bool {
        self.invoked
    }

    /// Run every callback in registration order
    ///
    /// With `once_per_frame`, a listener that already fired this frame is
    /// skipped. Returns whether the callbacks ran.
    pub fn invoke(&mut self, once_per_frame: bool) -> bool {
        if self.callbacks.is_empty() {
            return false;
        }
        if once_per_frame {
            if self.invoked {
                return false;
            }
            self.invoked = true;
        }
        for action in &self.callbacks {
            action.call();
        }
        true
    }

    pub(crate) fn reset_invoked(&mut self) {
        self.invoked = false;
    }
}
