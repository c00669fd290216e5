//! Input handlers: named sets of key tables and axes with a blocking policy

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use enum_map::EnumMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::axis::Axis;
use super::key::{KeyCode, KeyEvent, KeySlot};
use super::listener::{Action, Listener, ListenerDef};
use super::source::CursorPolicy;
use super::store::{HandlerConfig, SharedStore};

/// How a handler takes part in dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerPolicy {
    /// Fire each listener at most once per frame, even if both of its keys match
    pub invoke_once_per_frame: bool,
    /// Push onto the stack when the host reloads its context
    pub push_on_reload: bool,
    /// Cursor lock applied while this handler is on top of the stack
    pub cursor: CursorPolicy,
    /// While on top, only this handler receives key events
    pub hard_block_keys: bool,
    /// Stop walking the stack after a key matched one of this handler's listeners
    pub block_keys: bool,
    /// Handlers below this one contribute no axes
    pub hard_block_axes: bool,
}

impl Default for HandlerPolicy {
    fn default() -> Self {
        Self {
            invoke_once_per_frame: true,
            push_on_reload: false,
            cursor: CursorPolicy::Confined,
            hard_block_keys: false,
            block_keys: true,
            hard_block_axes: false,
        }
    }
}

/// Construction data for a handler: its name, policy and built-in bindings
///
/// The bindings are only used when the store has nothing saved for the
/// handler yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerTemplate {
    pub name: String,
    #[serde(default)]
    pub policy: HandlerPolicy,
    #[serde(default)]
    pub press_start: Vec<ListenerDef>,
    #[serde(default)]
    pub held: Vec<ListenerDef>,
    #[serde(default)]
    pub press_end: Vec<ListenerDef>,
    #[serde(default)]
    pub axes: Vec<Axis>,
}

impl HandlerTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder method to set the policy
    pub fn with_policy(mut self, policy: HandlerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builder method to add a default listener to one table
    pub fn with_listener(
        mut self,
        event: KeyEvent,
        name: impl Into<String>,
        positive: Option<KeyCode>,
        alternative: Option<KeyCode>,
    ) -> Self {
        let def = ListenerDef::new(name, positive, alternative);
        match event {
            KeyEvent::PressStart => self.press_start.push(def),
            KeyEvent::Held => self.held.push(def),
            KeyEvent::PressEnd => self.press_end.push(def),
        }
        self
    }

    /// Builder method to add a default axis
    pub fn with_axis(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.axes.push(Axis::new(name, source));
        self
    }

    fn default_config(&self) -> HandlerConfig {
        HandlerConfig {
            name: self.name.clone(),
            press_start: self.press_start.clone(),
            held: self.held.clone(),
            press_end: self.press_end.clone(),
            axes: self.axes.clone(),
        }
    }
}

/// Selects a listener by logical name or by the raw key it sits under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelector<'a> {
    Name(&'a str),
    Key(KeyCode),
}

impl<'a> From<&'a str> for KeySelector<'a> {
    fn from(name: &'a str) -> Self {
        KeySelector::Name(name)
    }
}

impl<'a> From<&'a String> for KeySelector<'a> {
    fn from(name: &'a String) -> Self {
        KeySelector::Name(name)
    }
}

impl From<KeyCode> for KeySelector<'_> {
    fn from(key: KeyCode) -> Self {
        KeySelector::Key(key)
    }
}

/// Which tables a rebind changed
///
/// Rebinding is best-effort: a table where the new key is already taken is
/// left alone while the others move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebindOutcome {
    /// Tables where the listener now sits under the new key
    pub moved: Vec<KeyEvent>,
    /// Tables holding the listener where the new key was already taken
    pub collided: Vec<KeyEvent>,
}

impl RebindOutcome {
    /// Every table holding the listener was updated
    pub fn is_complete(&self) -> bool {
        !self.moved.is_empty() && self.collided.is_empty()
    }
}

type ListenerId = u32;

/// One event class's key → listener table
#[derive(Debug, Default)]
struct KeyTable {
    /// Key slots in insertion order; a key appears at most once
    slots: IndexMap<KeyCode, ListenerId>,
    /// Listeners of this table in creation order
    listeners: BTreeMap<ListenerId, Listener>,
}

impl KeyTable {
    fn get(&self, key: KeyCode) -> Option<&Listener> {
        self.slots.get(&key).and_then(|id| self.listeners.get(id))
    }

    fn find(&self, name: &str) -> Option<ListenerId> {
        self.listeners
            .iter()
            .find(|(_, l)| l.name() == name)
            .map(|(id, _)| *id)
    }

    fn unslot(&mut self, id: ListenerId) {
        self.slots.retain(|_, slotted| *slotted != id);
    }

    fn is_slotted(&self, id: ListenerId) -> bool {
        self.slots.values().any(|slotted| *slotted == id)
    }
}

/// A named, independently configured set of key and axis bindings
pub struct Handler {
    name: String,
    policy: HandlerPolicy,
    defaults: HandlerConfig,
    store: SharedStore,
    tables: EnumMap<KeyEvent, KeyTable>,
    /// Logical name → first listener loaded under that name
    index: HashMap<String, (KeyEvent, ListenerId)>,
    axes: Vec<Axis>,
    next_id: ListenerId,
    dirty: bool,
    initialized: bool,
    /// Running on defaults because the saved config could not be read
    fallback: bool,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("tables", &self.tables)
            .field("axes", &self.axes)
            .field("dirty", &self.dirty)
            .field("initialized", &self.initialized)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl Handler {
    /// Creates an uninitialized handler; call [`Handler::initialize`] before use
    pub fn new(template: HandlerTemplate, store: SharedStore) -> Self {
        Self {
            name: template.name.clone(),
            defaults: template.default_config(),
            policy: template.policy,
            store,
            tables: EnumMap::default(),
            index: HashMap::new(),
            axes: Vec::new(),
            next_id: 0,
            dirty: false,
            initialized: false,
            fallback: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &HandlerPolicy {
        &self.policy
    }

    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Key footprint changed since the stack last recomputed its caches
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Load listeners and axes and fill the key tables
    ///
    /// Uses the saved config if the store has one, otherwise the template's
    /// defaults, which are then saved right away. If the saved config cannot
    /// be read the handler runs on its defaults and never saves, so the
    /// unreadable file is left for the user to repair. Returns false if the
    /// handler was already initialized.
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            return false;
        }

        let (config, from_defaults) = match self.store.load(&self.name) {
            Ok(Some(config)) => (config, false),
            Ok(None) => (self.defaults.clone(), true),
            Err(e) => {
                warn!(handler = %self.name, error = %e, "Failed to load handler config, using defaults without saving");
                self.fallback = true;
                (self.defaults.clone(), false)
            }
        };

        for event in KeyEvent::ALL {
            for def in config.listeners(event) {
                self.load_listener(event, Listener::from_def(def));
            }
        }
        self.axes = config.axes;
        self.initialized = true;

        info!(
            handler = %self.name,
            listeners = self.index.len(),
            axes = self.axes.len(),
            from_defaults,
            "Handler initialized"
        );

        if from_defaults {
            self.save();
        }
        true
    }

    fn alloc_id(&mut self) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn load_listener(&mut self, event: KeyEvent, listener: Listener) {
        let id = self.alloc_id();
        let table = &mut self.tables[event];
        for key in listener.keys() {
            if table.slots.contains_key(&key) {
                warn!(handler = %self.name, listener = listener.name(), %key, ?event, "Key already bound in table, skipping");
                continue;
            }
            table.slots.insert(key, id);
        }
        self.index
            .entry(listener.name().to_string())
            .or_insert((event, id));
        table.listeners.insert(id, listener);
    }

    /// Every key across the three tables; a key bound in several tables repeats
    pub fn all_key_codes(&self) -> Vec<KeyCode> {
        KeyEvent::ALL
            .iter()
            .flat_map(|event| self.tables[*event].slots.keys().copied())
            .collect()
    }

    /// Listener with the given logical name
    pub fn listener_by_name(&self, name: &str) -> Option<&Listener> {
        let (event, id) = self.index.get(name)?;
        self.tables[*event].listeners.get(id)
    }

    /// Listener sitting under `key` in the `event` table
    pub fn listener(&self, event: KeyEvent, key: KeyCode) -> Option<&Listener> {
        self.tables[event].get(key)
    }

    /// Listeners of the `event` table in creation order, slotted or not
    pub fn listeners(&self, event: KeyEvent) -> impl Iterator<Item = &Listener> {
        self.tables[event].listeners.values()
    }

    /// Key slots of the `event` table
    pub fn slots(&self, event: KeyEvent) -> impl Iterator<Item = (KeyCode, &Listener)> {
        let table = &self.tables[event];
        table
            .slots
            .iter()
            .filter_map(|(key, id)| table.listeners.get(id).map(|l| (*key, l)))
    }

    /// Move a listener from `old` to `new` in every table where that is possible
    ///
    /// A table changes only if it holds `old`, the listener there is `name`,
    /// and `new` is free in it. The handler is saved afterwards either way.
    pub fn rebind_key(&mut self, name: &str, old: KeyCode, new: KeyCode) -> RebindOutcome {
        let mut outcome = RebindOutcome::default();
        for event in KeyEvent::ALL {
            let table = &mut self.tables[event];
            let Some(&id) = table.slots.get(&old) else {
                continue;
            };
            let Some(listener) = table.listeners.get_mut(&id) else {
                continue;
            };
            if listener.name() != name {
                continue;
            }
            if old == new {
                outcome.moved.push(event);
                continue;
            }
            if table.slots.contains_key(&new) {
                outcome.collided.push(event);
                continue;
            }

            table.slots.shift_remove(&old);
            table.slots.insert(new, id);
            if let Some(slot) = listener.slot_of(old) {
                listener.set_slot(slot, Some(new));
            }
            outcome.moved.push(event);
        }

        self.finish_rebind(name, &outcome, Some(old), new);
        outcome
    }

    /// Point one key slot of a listener at `new`, in every table holding it
    ///
    /// Like [`Handler::rebind_key`] with the slot's current key as `old`;
    /// an empty slot is bound under `new` wherever `new` is free.
    pub fn rebind_slot(&mut self, name: &str, slot: KeySlot, new: KeyCode) -> RebindOutcome {
        let mut outcome = RebindOutcome::default();
        let mut old_key = None;
        for event in KeyEvent::ALL {
            let table = &mut self.tables[event];
            let Some(id) = table.find(name) else {
                continue;
            };
            let Some(listener) = table.listeners.get_mut(&id) else {
                continue;
            };
            let old = listener.slot(slot);
            old_key = old_key.or(old);
            if old == Some(new) {
                outcome.moved.push(event);
                continue;
            }
            if table.slots.contains_key(&new) {
                outcome.collided.push(event);
                continue;
            }

            if let Some(old) = old
                && table.slots.get(&old) == Some(&id)
            {
                table.slots.shift_remove(&old);
            }
            table.slots.insert(new, id);
            listener.set_slot(slot, Some(new));
            outcome.moved.push(event);
        }

        self.finish_rebind(name, &outcome, old_key, new);
        outcome
    }

    fn finish_rebind(
        &mut self,
        name: &str,
        outcome: &RebindOutcome,
        old: Option<KeyCode>,
        new: KeyCode,
    ) {
        if !outcome.moved.is_empty() {
            self.dirty = true;
        }
        if !outcome.collided.is_empty() {
            warn!(handler = %self.name, listener = name, %new, collided = ?outcome.collided, "Key already taken, rebind skipped those tables");
        }
        info!(handler = %self.name, listener = name, ?old, %new, moved = ?outcome.moved, "Rebound listener key");
        self.save();
    }

    /// Subscribe `action` to a listener of the `event` table
    ///
    /// By name, the first listener with that name gets the callback and its
    /// keys are slotted again wherever they are free. By key, the listener
    /// under that key gets it, and if there is none a listener bound only to
    /// that key is created. Returns false if no listener was found by name or
    /// the handle was already subscribed.
    pub fn add_callback<'a>(
        &mut self,
        selector: impl Into<KeySelector<'a>>,
        action: Action,
        event: KeyEvent,
    ) -> bool {
        match selector.into() {
            KeySelector::Name(name) => {
                let table = &mut self.tables[event];
                let Some(id) = table.find(name) else {
                    debug!(handler = %self.name, listener = name, ?event, "No listener to subscribe to");
                    return false;
                };
                let Some(listener) = table.listeners.get_mut(&id) else {
                    return false;
                };
                if !listener.add_callback(action) {
                    return false;
                }
                let keys: Vec<KeyCode> = listener.keys().collect();
                for key in keys {
                    if !table.slots.contains_key(&key) {
                        table.slots.insert(key, id);
                    }
                }
                self.dirty = true;
                true
            }
            KeySelector::Key(key) => {
                if let Some(&id) = self.tables[event].slots.get(&key) {
                    return self.tables[event]
                        .listeners
                        .get_mut(&id)
                        .is_some_and(|l| l.add_callback(action));
                }

                let id = self.alloc_id();
                let mut listener = Listener::for_key(key);
                listener.add_callback(action);
                self.index
                    .entry(listener.name().to_string())
                    .or_insert((event, id));
                let table = &mut self.tables[event];
                table.slots.insert(key, id);
                table.listeners.insert(id, listener);
                self.dirty = true;
                debug!(handler = %self.name, %key, ?event, "Created listener for raw key");
                self.save();
                true
            }
        }
    }

    /// Unsubscribe `action` from a listener of the `event` table
    ///
    /// A listener left without callbacks stops receiving keys in this table:
    /// by name, both of its key slots are cleared; by key, only that one. It
    /// keeps its bindings, so it can still be found, rebound and subscribed
    /// again. Only a raw key listener is dropped once its last callback goes.
    /// Returns false if the handle was not subscribed.
    pub fn remove_callback<'a>(
        &mut self,
        selector: impl Into<KeySelector<'a>>,
        action: &Action,
        event: KeyEvent,
    ) -> bool {
        let mut removed = false;
        let mut unslotted = false;
        let mut dropped = false;

        match selector.into() {
            KeySelector::Name(name) => {
                let ids: Vec<ListenerId> = self.tables[event]
                    .listeners
                    .iter()
                    .filter(|(_, l)| l.name() == name)
                    .map(|(id, _)| *id)
                    .collect();
                for id in ids {
                    let table = &mut self.tables[event];
                    let Some(listener) = table.listeners.get_mut(&id) else {
                        continue;
                    };
                    if !listener.remove_callback(action) {
                        continue;
                    }
                    removed = true;
                    if listener.has_callbacks() {
                        continue;
                    }
                    let disposable = listener.is_disposable();
                    if table.is_slotted(id) {
                        table.unslot(id);
                        unslotted = true;
                    }
                    if disposable {
                        self.drop_listener(event, id);
                        dropped = true;
                    }
                }
            }
            KeySelector::Key(key) => {
                let table = &mut self.tables[event];
                let Some(&id) = table.slots.get(&key) else {
                    return false;
                };
                let Some(listener) = table.listeners.get_mut(&id) else {
                    return false;
                };
                if !listener.remove_callback(action) {
                    return false;
                }
                removed = true;
                if !listener.has_callbacks() {
                    let disposable = listener.is_disposable();
                    table.slots.shift_remove(&key);
                    unslotted = true;
                    if disposable && !table.is_slotted(id) {
                        self.drop_listener(event, id);
                        dropped = true;
                    }
                }
            }
        }

        if unslotted {
            self.dirty = true;
        }
        if dropped {
            self.save();
        }
        removed
    }

    fn drop_listener(&mut self, event: KeyEvent, id: ListenerId) {
        let Some(listener) = self.tables[event].listeners.remove(&id) else {
            return;
        };
        debug!(handler = %self.name, listener = listener.name(), ?event, "Dropped listener");

        if self.index.get(listener.name()) != Some(&(event, id)) {
            return;
        }
        let replacement = KeyEvent::ALL
            .iter()
            .find_map(|e| self.tables[*e].find(listener.name()).map(|id| (*e, id)));
        match replacement {
            Some(entry) => {
                self.index.insert(listener.name().to_string(), entry);
            }
            None => {
                self.index.remove(listener.name());
            }
        }
    }

    /// Fire the listener under `key` in the `event` table
    ///
    /// `None` if there is no listener there, otherwise whether its callbacks ran.
    pub(crate) fn fire(&mut self, event: KeyEvent, key: KeyCode) -> Option<bool> {
        let once = self.policy.invoke_once_per_frame;
        let table = &mut self.tables[event];
        let id = *table.slots.get(&key)?;
        let listener = table.listeners.get_mut(&id)?;
        let ran = listener.invoke(once);
        if ran {
            debug!(handler = %self.name, listener = listener.name(), %key, ?event, "Invoked listener");
        }
        Some(ran)
    }

    /// Clear the once-per-frame marks; call after all dispatch for the frame
    pub fn reset_frame(&mut self) {
        if !self.policy.invoke_once_per_frame {
            return;
        }
        for table in self.tables.values_mut() {
            for listener in table.listeners.values_mut() {
                listener.reset_invoked();
            }
        }
    }

    /// Current bindings in their persisted shape
    pub fn to_config(&self) -> HandlerConfig {
        let defs = |event: KeyEvent| -> Vec<ListenerDef> {
            self.tables[event].listeners.values().map(Listener::to_def).collect()
        };
        HandlerConfig {
            name: self.name.clone(),
            press_start: defs(KeyEvent::PressStart),
            held: defs(KeyEvent::Held),
            press_end: defs(KeyEvent::PressEnd),
            axes: self.axes.clone(),
        }
    }

    /// Persist the current bindings; failures are logged and absorbed
    ///
    /// Does nothing while the handler runs on fallback defaults.
    pub fn save(&self) {
        if self.fallback {
            debug!(handler = %self.name, "Saved config unreadable, not overwriting it");
            return;
        }
        if let Err(e) = self.store.save(&self.to_config()) {
            warn!(handler = %self.name, error = %e, "Failed to save handler config");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::store::{HandlerStore, MemoryStore, StoreError};
    use std::cell::Cell;
    use std::rc::Rc;

    fn movement_template() -> HandlerTemplate {
        HandlerTemplate::new("Movement")
            .with_listener(KeyEvent::PressStart, "Jump", Some(KeyCode::Space), None)
            .with_listener(KeyEvent::Held, "Forward", Some(KeyCode::W), Some(KeyCode::Up))
            .with_listener(KeyEvent::PressEnd, "Jump", Some(KeyCode::Space), None)
            .with_listener(KeyEvent::PressStart, "Crouch", None, None)
            .with_axis("Horizontal", "joy0_x")
    }

    fn handler_with(store: &Rc<MemoryStore>) -> Handler {
        let mut handler = Handler::new(movement_template(), store.clone());
        assert!(handler.initialize());
        handler
    }

    fn counter() -> (Rc<Cell<u32>>, Action) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, Action::new(move || c.set(c.get() + 1)))
    }

    #[test]
    fn test_initialize_falls_back_to_defaults_and_saves() {
        let store = Rc::new(MemoryStore::new());
        let handler = handler_with(&store);

        assert_eq!(store.save_count(), 1);
        let saved = store.get("Movement").unwrap();
        assert_eq!(saved.press_start.len(), 2);
        assert_eq!(saved.axes, vec![Axis::new("Horizontal", "joy0_x")]);
        assert_eq!(handler.axes().len(), 1);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        assert!(!handler.initialize());
        assert_eq!(handler.all_key_codes().len(), 4);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_initialize_prefers_saved_config() {
        let store = Rc::new(MemoryStore::new());
        let mut saved = HandlerConfig::new("Movement");
        saved
            .press_start
            .push(ListenerDef::new("Jump", Some(KeyCode::J), None));
        store.insert(saved);

        let mut handler = Handler::new(movement_template(), store.clone());
        assert!(handler.initialize());

        assert_eq!(store.save_count(), 0, "saved config must not be rewritten");
        assert_eq!(handler.all_key_codes(), vec![KeyCode::J]);
        assert!(handler.axes().is_empty());
    }

    #[test]
    fn test_name_index_and_none_slots() {
        let store = Rc::new(MemoryStore::new());
        let handler = handler_with(&store);

        let jump = handler.listener_by_name("Jump").unwrap();
        assert_eq!(jump.positive(), Some(KeyCode::Space));
        assert!(handler.listener_by_name("Missing").is_none());

        // Crouch has no keys: indexed but never slotted
        assert!(handler.listener_by_name("Crouch").is_some());
        for event in KeyEvent::ALL {
            assert!(handler.slots(event).all(|(_, l)| l.name() != "Crouch"));
        }

        let forward = handler.listener(KeyEvent::Held, KeyCode::Up).unwrap();
        assert_eq!(forward.name(), "Forward");
        assert_eq!(
            handler.listener(KeyEvent::Held, KeyCode::W).unwrap().name(),
            "Forward"
        );
    }

    #[test]
    fn test_all_key_codes_keeps_duplicates_across_tables() {
        let store = Rc::new(MemoryStore::new());
        let handler = handler_with(&store);
        let keys = handler.all_key_codes();
        assert_eq!(
            keys.iter().filter(|k| **k == KeyCode::Space).count(),
            2,
            "Space is bound in press-start and press-end"
        );
    }

    #[test]
    fn test_rebind_moves_entry_in_every_table() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);

        let outcome = handler.rebind_key("Jump", KeyCode::Space, KeyCode::J);
        assert_eq!(outcome.moved, vec![KeyEvent::PressStart, KeyEvent::PressEnd]);
        assert!(outcome.is_complete());
        assert!(handler.listener(KeyEvent::PressStart, KeyCode::Space).is_none());
        assert_eq!(
            handler.listener(KeyEvent::PressEnd, KeyCode::J).unwrap().positive(),
            Some(KeyCode::J)
        );
        assert!(handler.is_dirty());
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_rebind_skips_table_with_collision() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (_, action) = counter();
        // Occupy J only in the press-end table
        handler.add_callback(KeyCode::J, action, KeyEvent::PressEnd);

        let outcome = handler.rebind_key("Jump", KeyCode::Space, KeyCode::J);
        assert_eq!(outcome.moved, vec![KeyEvent::PressStart]);
        assert_eq!(outcome.collided, vec![KeyEvent::PressEnd]);
        assert_eq!(
            handler.listener(KeyEvent::PressEnd, KeyCode::Space).unwrap().name(),
            "Jump"
        );
        assert_eq!(
            handler.listener(KeyEvent::PressEnd, KeyCode::J).unwrap().name(),
            "J"
        );
    }

    #[test]
    fn test_rebind_ignores_other_listener_names() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let outcome = handler.rebind_key("Forward", KeyCode::Space, KeyCode::J);
        assert!(outcome.moved.is_empty());
        assert!(!handler.is_dirty());
        // Still saved
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_rebind_slot_fills_empty_alternative() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);

        let outcome = handler.rebind_slot("Jump", KeySlot::Alternative, KeyCode::K);
        assert!(outcome.is_complete());
        assert_eq!(
            handler.listener(KeyEvent::PressStart, KeyCode::K).unwrap().name(),
            "Jump"
        );
        assert!(handler.listener(KeyEvent::PressStart, KeyCode::Space).is_some());
        assert_eq!(
            handler.listener_by_name("Jump").unwrap().alternative(),
            Some(KeyCode::K)
        );
    }

    #[test]
    fn test_raw_key_listener_lifecycle() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (count, action) = counter();

        assert!(handler.add_callback(KeyCode::F1, action.clone(), KeyEvent::PressStart));
        assert!(handler.is_dirty());
        assert_eq!(handler.listener_by_name("F1").unwrap().positive(), Some(KeyCode::F1));
        let created = handler.listener(KeyEvent::PressStart, KeyCode::F1).unwrap();
        assert_eq!(created.positive(), Some(KeyCode::F1));
        assert_eq!(created.alternative(), None);
        assert_eq!(handler.listeners(KeyEvent::PressStart).count(), 3);

        assert_eq!(handler.fire(KeyEvent::PressStart, KeyCode::F1), Some(true));
        assert_eq!(count.get(), 1);

        handler.mark_clean();
        assert!(handler.remove_callback(KeyCode::F1, &action, KeyEvent::PressStart));
        assert!(handler.is_dirty());
        assert!(handler.listener(KeyEvent::PressStart, KeyCode::F1).is_none());
        assert!(handler.listener_by_name("F1").is_none());
        assert_eq!(handler.listeners(KeyEvent::PressStart).count(), 2);
        assert!(store.get("Movement").unwrap().press_start.iter().all(|d| d.name != "F1"));
    }

    #[test]
    fn test_add_by_name_marks_dirty_and_fires() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (count, action) = counter();

        assert!(!handler.add_callback("Nope", action.clone(), KeyEvent::PressStart));
        assert!(handler.add_callback("Forward", action, KeyEvent::Held));
        assert!(handler.is_dirty());

        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::Up), Some(true));
        assert_eq!(count.get(), 1);
        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::A), None);
    }

    #[test]
    fn test_remove_by_name_clears_both_slots() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (count, action) = counter();
        handler.add_callback("Forward", action.clone(), KeyEvent::Held);
        handler.mark_clean();

        assert!(handler.remove_callback("Forward", &action, KeyEvent::Held));
        assert!(handler.is_dirty());
        assert!(handler.listener(KeyEvent::Held, KeyCode::W).is_none());
        assert!(handler.listener(KeyEvent::Held, KeyCode::Up).is_none());
        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::W), None);
        assert!(!handler.remove_callback("Forward", &action, KeyEvent::Held));

        // Bindings are kept, so subscribing again restores both keys
        let forward = handler.listener_by_name("Forward").unwrap();
        assert_eq!(forward.positive(), Some(KeyCode::W));
        assert_eq!(forward.alternative(), Some(KeyCode::Up));
        assert!(handler.add_callback("Forward", action, KeyEvent::Held));
        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::Up), Some(true));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_remove_by_key_clears_only_that_key() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (_, action) = counter();
        handler.add_callback("Forward", action.clone(), KeyEvent::Held);

        assert!(handler.remove_callback(KeyCode::W, &action, KeyEvent::Held));
        assert!(handler.listener(KeyEvent::Held, KeyCode::W).is_none());
        assert_eq!(
            handler.listener(KeyEvent::Held, KeyCode::Up).unwrap().name(),
            "Forward"
        );
        assert!(handler.listener_by_name("Forward").is_some());
    }

    #[test]
    fn test_unsubscribed_listener_survives_save_and_reload() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (_, action) = counter();
        handler.add_callback("Jump", action.clone(), KeyEvent::PressStart);
        assert!(handler.remove_callback("Jump", &action, KeyEvent::PressStart));
        assert_eq!(store.save_count(), 1, "unslotting alone does not save");

        // Any later save still carries the unsubscribed listener
        handler.rebind_key("Forward", KeyCode::W, KeyCode::S);
        let saved = store.get("Movement").unwrap();
        assert_eq!(
            saved.press_start[0],
            ListenerDef::new("Jump", Some(KeyCode::Space), None)
        );

        let mut reloaded = Handler::new(movement_template(), store.clone());
        assert!(reloaded.initialize());
        assert_eq!(
            reloaded.listener(KeyEvent::PressStart, KeyCode::Space).unwrap().name(),
            "Jump"
        );
        assert_eq!(
            reloaded.listener(KeyEvent::Held, KeyCode::S).unwrap().name(),
            "Forward"
        );
    }

    #[test]
    fn test_unsubscribe_leaves_other_tables_alone() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (_, action) = counter();
        handler.add_callback("Jump", action.clone(), KeyEvent::PressStart);
        handler.remove_callback("Jump", &action, KeyEvent::PressStart);

        assert!(handler.listener(KeyEvent::PressStart, KeyCode::Space).is_none());
        assert!(handler.listener(KeyEvent::PressEnd, KeyCode::Space).is_some());
        let jump = handler.listener_by_name("Jump").unwrap();
        assert_eq!(jump.positive(), Some(KeyCode::Space));
    }

    #[test]
    fn test_index_falls_back_when_raw_listener_dropped() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (_, action) = counter();
        handler.add_callback(KeyCode::F2, action.clone(), KeyEvent::PressStart);
        handler.add_callback(KeyCode::F2, action.clone(), KeyEvent::PressEnd);

        assert!(handler.remove_callback(KeyCode::F2, &action, KeyEvent::PressStart));
        assert!(handler.listener(KeyEvent::PressStart, KeyCode::F2).is_none());
        let f2 = handler.listener_by_name("F2").unwrap();
        assert_eq!(f2.positive(), Some(KeyCode::F2));

        assert!(handler.remove_callback("F2", &action, KeyEvent::PressEnd));
        assert!(handler.listener_by_name("F2").is_none());
    }

    #[test]
    fn test_rebind_onto_same_key_is_a_noop_move() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);

        let outcome = handler.rebind_key("Jump", KeyCode::Space, KeyCode::Space);
        assert_eq!(outcome.moved, vec![KeyEvent::PressStart, KeyEvent::PressEnd]);
        assert!(outcome.collided.is_empty());
        assert!(outcome.is_complete());
        assert_eq!(
            handler.listener(KeyEvent::PressStart, KeyCode::Space).unwrap().name(),
            "Jump"
        );
    }

    struct UnreadableStore {
        saves: Cell<u32>,
    }

    impl HandlerStore for UnreadableStore {
        fn load(&self, handler: &str) -> Result<Option<HandlerConfig>, StoreError> {
            Err(StoreError::InvalidName(handler.to_string()))
        }

        fn save(&self, _config: &HandlerConfig) -> Result<(), StoreError> {
            self.saves.set(self.saves.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_unreadable_config_is_never_overwritten() {
        let store = Rc::new(UnreadableStore { saves: Cell::new(0) });
        let mut handler = Handler::new(movement_template(), store.clone());
        assert!(handler.initialize());
        assert_eq!(
            handler.listener_by_name("Jump").unwrap().positive(),
            Some(KeyCode::Space)
        );

        let (_, action) = counter();
        handler.add_callback(KeyCode::F1, action.clone(), KeyEvent::PressStart);
        handler.remove_callback(KeyCode::F1, &action, KeyEvent::PressStart);
        handler.rebind_key("Jump", KeyCode::Space, KeyCode::J);
        handler.save();

        assert_eq!(store.saves.get(), 0);
        assert_eq!(
            handler.listener(KeyEvent::PressStart, KeyCode::J).unwrap().name(),
            "Jump"
        );
    }

    #[test]
    fn test_reset_frame_clears_invoked() {
        let store = Rc::new(MemoryStore::new());
        let mut handler = handler_with(&store);
        let (count, action) = counter();
        handler.add_callback("Forward", action, KeyEvent::Held);

        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::W), Some(true));
        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::Up), Some(false));
        assert_eq!(count.get(), 1);

        handler.reset_frame();
        assert_eq!(handler.fire(KeyEvent::Held, KeyCode::Up), Some(true));
        assert_eq!(count.get(), 2);
    }
}
