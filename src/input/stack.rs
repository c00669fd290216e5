//! The handler stack: merged caches, per-frame dispatch and blocking

use std::fmt::Write as _;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use super::axis::Axis;
use super::handler::{Handler, HandlerTemplate};
use super::key::{KeyCode, KeyEvent, KeySlot};
use super::listener::Listener;
use super::registry::HandlerRegistry;
use super::remap::{RemapId, RemapSession, RemapStatus};
use super::source::{CursorPolicy, CursorSink, InputSource};
use super::store::SharedStore;
use crate::config::AppConfig;

/// A logical action to query: by name or by listener
#[derive(Debug, Clone, Copy)]
pub enum ActionRef<'a> {
    Name(&'a str),
    Listener(&'a Listener),
}

impl<'a> From<&'a str> for ActionRef<'a> {
    fn from(name: &'a str) -> Self {
        ActionRef::Name(name)
    }
}

impl<'a> From<&'a Listener> for ActionRef<'a> {
    fn from(listener: &'a Listener) -> Self {
        ActionRef::Listener(listener)
    }
}

/// Handlers and stack order kept alive across a context reload
pub struct PreservedStack {
    /// Registered handlers in registration order
    pub handlers: Vec<Handler>,
    /// Stack order, bottom first
    pub stack: Vec<String>,
    remap_timeout: Option<u32>,
    store: SharedStore,
}

impl std::fmt::Debug for PreservedStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreservedStack")
            .field("handlers", &self.handlers)
            .field("stack", &self.stack)
            .field("remap_timeout", &self.remap_timeout)
            .finish_non_exhaustive()
    }
}

/// Ordered stack of input handlers
///
/// The top of the stack is the most recently pushed handler and has the
/// highest priority. Every frame the host calls [`InputStack::dispatch`],
/// then [`InputStack::end_frame`]; [`InputStack::apply_cursor`] may run at
/// its own cadence.
pub struct InputStack {
    store: SharedStore,
    registry: HandlerRegistry,
    /// Handler names, bottom first
    stack: Vec<String>,
    /// Keys polled each frame, each at most once
    keys: Vec<KeyCode>,
    /// Axes visible from the top of the stack, first writer wins
    axes: IndexMap<String, Axis>,
    cursor: CursorPolicy,
    remaps: Vec<RemapSession>,
    next_remap: u64,
    remap_timeout: Option<u32>,
}

impl std::fmt::Debug for InputStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputStack")
            .field("registry", &self.registry)
            .field("stack", &self.stack)
            .field("keys", &self.keys)
            .field("axes", &self.axes)
            .field("cursor", &self.cursor)
            .field("remaps", &self.remaps)
            .finish_non_exhaustive()
    }
}

impl InputStack {
    /// Creates an empty stack whose handlers persist through `store`
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            registry: HandlerRegistry::new(),
            stack: Vec::new(),
            keys: Vec::new(),
            axes: IndexMap::new(),
            cursor: CursorPolicy::default(),
            remaps: Vec::new(),
            next_remap: 0,
            remap_timeout: None,
        }
    }

    /// Builds a stack from configuration: registers every handler template,
    /// then pushes the ones marked `push_on_reload`
    pub fn from_config(config: &AppConfig, store: SharedStore) -> Self {
        let mut stack = Self::new(store).with_remap_timeout(config.remap.timeout_frames);
        for template in &config.handlers {
            stack.register(template.clone());
        }
        stack.reload();
        stack
    }

    /// Builder method to give up remap sessions after `frames` frames without a key
    pub fn with_remap_timeout(mut self, frames: Option<u32>) -> Self {
        self.remap_timeout = frames;
        self
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Create, initialize and register a handler from a template
    pub fn register(&mut self, template: HandlerTemplate) -> bool {
        let handler = Handler::new(template, self.store.clone());
        self.registry.insert(handler)
    }

    /// Register an already constructed handler, initializing it
    ///
    /// If the name is already registered the handler is handed back
    /// untouched.
    pub fn register_handler(&mut self, handler: Handler) -> Result<(), Handler> {
        if self.registry.contains(handler.name()) {
            warn!(handler = handler.name(), "A handler with this name is already registered");
            return Err(handler);
        }
        self.registry.insert(handler);
        Ok(())
    }

    /// Deregister a handler and remove it from the stack
    ///
    /// Remap sessions targeting it end as [`RemapStatus::Abandoned`] on the
    /// next [`InputStack::tick_remaps`].
    pub fn deregister(&mut self, name: &str) -> Option<Handler> {
        let handler = self.registry.remove(name)?;
        if self.contains(name) {
            self.remove(name);
        }
        Some(handler)
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.registry.get(name)
    }

    /// Mutable access for callback registration; footprint changes are
    /// picked up at the next dispatch
    pub fn handler_mut(&mut self, name: &str) -> Option<&mut Handler> {
        self.registry.get_mut(name)
    }

    /// Re-initialize live handlers after a context reload and push the
    /// ones marked `push_on_reload`. Returns how many were pushed.
    pub fn reload(&mut self) -> usize {
        let mut to_push = Vec::new();
        for handler in self.registry.iter_mut() {
            handler.initialize();
            if handler.policy().push_on_reload {
                to_push.push(handler.name().to_string());
            }
        }

        let pushed = to_push.into_iter().filter(|name| self.push(name)).count();
        info!(handlers = self.registry.len(), pushed, "Reattached handlers");
        pushed
    }

    /// Push a registered handler on top of the stack
    ///
    /// Returns false if no handler has that name or it is already stacked.
    pub fn push(&mut self, name: &str) -> bool {
        if !self.registry.contains(name) {
            warn!(handler = name, "Cannot push unregistered handler");
            return false;
        }
        if self.contains(name) {
            warn!(handler = name, "Handler is already on the stack");
            return false;
        }
        self.stack.push(name.to_string());
        info!(handler = name, depth = self.stack.len(), "Pushed handler");
        self.update_stack();
        true
    }

    /// Register a handler and push it
    ///
    /// If the name is already registered the handler is handed back and the
    /// stack is left as it was.
    pub fn push_handler(&mut self, handler: Handler) -> Result<(), Handler> {
        let name = handler.name().to_string();
        self.register_handler(handler)?;
        self.push(&name);
        Ok(())
    }

    /// Pop the top handler, returning its name
    pub fn pop(&mut self) -> Option<String> {
        let name = self.stack.pop()?;
        info!(handler = %name, depth = self.stack.len(), "Popped handler");
        self.update_stack();
        Some(name)
    }

    /// Remove a handler from anywhere in the stack, keeping the others' order
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.stack.len();
        self.stack.retain(|n| n != name);
        let removed = self.stack.len() != before;
        if removed {
            info!(handler = name, depth = self.stack.len(), "Removed handler from stack");
        }
        self.update_stack();
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stack.iter().any(|n| n == name)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn top(&self) -> Option<&Handler> {
        self.stack.last().and_then(|name| self.registry.get(name))
    }

    /// Stacked handlers, top first
    pub fn iter(&self) -> impl Iterator<Item = &Handler> {
        self.stack
            .iter()
            .rev()
            .filter_map(|name| self.registry.get(name))
    }

    /// Recompute merged keys, merged axes and cursor policy from the stack
    pub fn update_stack(&mut self) {
        let mut keys = IndexSet::new();
        let mut axes = IndexMap::new();
        let mut axes_open = true;

        for name in self.stack.iter().rev() {
            let Some(handler) = self.registry.get_mut(name) else {
                continue;
            };
            keys.extend(handler.all_key_codes());

            if axes_open {
                for axis in handler.axes() {
                    axes.entry(axis.name.clone()).or_insert_with(|| axis.clone());
                }
                if handler.policy().hard_block_axes {
                    axes_open = false;
                }
            }
            handler.mark_clean();
        }

        self.keys = keys.into_iter().collect();
        self.axes = axes;
        if let Some(cursor) = self.top().map(|top| top.policy().cursor) {
            self.cursor = cursor;
        }
        debug!(
            keys = self.keys.len(),
            axes = self.axes.len(),
            cursor = ?self.cursor,
            "Updated stack caches"
        );
    }

    fn refresh_if_dirty(&mut self) {
        if self.iter().any(Handler::is_dirty) {
            self.update_stack();
        }
    }

    /// Keys polled each frame
    pub fn key_codes(&self) -> &[KeyCode] {
        &self.keys
    }

    /// Axes visible from the top of the stack
    pub fn axes(&self) -> impl Iterator<Item = &Axis> {
        self.axes.values()
    }

    pub fn cursor(&self) -> CursorPolicy {
        self.cursor
    }

    /// Hand the current cursor policy to the host
    pub fn apply_cursor(&self, sink: &mut dyn CursorSink) {
        sink.apply_cursor(self.cursor, self.cursor.is_visible());
    }

    /// Value of a merged axis, or 0.0 if no stacked handler exposes it
    pub fn axis<I: InputSource + ?Sized>(&self, input: &I, name: &str) -> f32 {
        self.axes
            .get(name)
            .map_or(0.0, |axis| input.axis_value(&axis.source))
    }

    /// Poll every merged key and fire matching listeners through the stack
    ///
    /// Returns the number of listener invocations.
    pub fn dispatch<I: InputSource + ?Sized>(&mut self, input: &I) -> usize {
        self.refresh_if_dirty();
        if self.stack.is_empty() {
            return 0;
        }

        let mut invoked = 0;
        for i in 0..self.keys.len() {
            let key = self.keys[i];
            for event in KeyEvent::ALL {
                if input.matches(key, event) {
                    invoked += self.dispatch_key(key, event);
                }
            }
        }
        invoked
    }

    fn dispatch_key(&mut self, key: KeyCode, event: KeyEvent) -> usize {
        let Some(top) = self.stack.last() else {
            return 0;
        };
        let Some(top) = self.registry.get_mut(top) else {
            return 0;
        };
        if top.policy().hard_block_keys {
            return usize::from(top.fire(event, key) == Some(true));
        }

        let mut invoked = 0;
        for name in self.stack.iter().rev() {
            let Some(handler) = self.registry.get_mut(name) else {
                continue;
            };
            let Some(ran) = handler.fire(event, key) else {
                continue;
            };
            invoked += usize::from(ran);
            if handler.policy().block_keys {
                break;
            }
        }
        invoked
    }

    /// Clear once-per-frame marks on every live handler; call after dispatch
    pub fn end_frame(&mut self) {
        for handler in self.registry.iter_mut() {
            handler.reset_frame();
        }
    }

    /// Whether a logical action is held and reachable through the stack
    ///
    /// Unlike dispatch, queries invoke nothing. Walking the stack from the
    /// top, a handler holding the action itself answers true; a
    /// soft-blocking handler holding another listener on one of the same
    /// keys, or any hard-blocking handler, answers false.
    pub fn is_pressed<'a, I: InputSource + ?Sized>(
        &self,
        input: &I,
        action: impl Into<ActionRef<'a>>,
    ) -> bool {
        self.query(input, action.into(), KeyEvent::Held)
    }

    /// Like [`InputStack::is_pressed`] for the frame the key went down
    pub fn is_just_pressed<'a, I: InputSource + ?Sized>(
        &self,
        input: &I,
        action: impl Into<ActionRef<'a>>,
    ) -> bool {
        self.query(input, action.into(), KeyEvent::PressStart)
    }

    /// Like [`InputStack::is_pressed`] for the frame the key went up
    pub fn is_just_released<'a, I: InputSource + ?Sized>(
        &self,
        input: &I,
        action: impl Into<ActionRef<'a>>,
    ) -> bool {
        self.query(input, action.into(), KeyEvent::PressEnd)
    }

    /// First listener with this name across the registry
    fn resolve(&self, name: &str) -> Option<&Listener> {
        self.registry.iter().find_map(|h| h.listener_by_name(name))
    }

    fn query<I: InputSource + ?Sized>(&self, input: &I, action: ActionRef<'_>, event: KeyEvent) -> bool {
        let listener = match action {
            ActionRef::Name(name) => match self.resolve(name) {
                Some(listener) => listener,
                None => return false,
            },
            ActionRef::Listener(listener) => listener,
        };

        if !listener.keys().any(|key| input.matches(key, event)) {
            return false;
        }

        for handler in self.iter() {
            if handler.slots(event).any(|(_, l)| l.name() == listener.name()) {
                return true;
            }
            let blocked = handler.policy().block_keys
                && handler
                    .slots(event)
                    .any(|(_, l)| l.shares_key_with(listener));
            if handler.policy().hard_block_keys || blocked {
                return false;
            }
        }
        false
    }

    /// Start listening for a new key for one slot of a listener
    ///
    /// Returns `None` if the handler or listener does not exist, or a
    /// session for that listener is already running.
    pub fn start_remap(&mut self, handler: &str, listener: &str, slot: KeySlot) -> Option<RemapId> {
        self.spawn_remap(handler, listener, slot, None)
    }

    /// Like [`InputStack::start_remap`], calling `on_complete` with the new key
    pub fn start_remap_with(
        &mut self,
        handler: &str,
        listener: &str,
        slot: KeySlot,
        on_complete: impl FnOnce(KeyCode) + 'static,
    ) -> Option<RemapId> {
        self.spawn_remap(handler, listener, slot, Some(Box::new(on_complete)))
    }

    fn spawn_remap(
        &mut self,
        handler: &str,
        listener: &str,
        slot: KeySlot,
        on_complete: Option<Box<dyn FnOnce(KeyCode)>>,
    ) -> Option<RemapId> {
        let Some(h) = self.registry.get(handler) else {
            warn!(handler, "Cannot remap: unknown handler");
            return None;
        };
        if h.listener_by_name(listener).is_none() {
            warn!(handler, listener, "Cannot remap: unknown listener");
            return None;
        }
        if self.remaps.iter().any(|s| s.targets(handler, listener)) {
            warn!(handler, listener, "Remap already in progress");
            return None;
        }

        let id = RemapId(self.next_remap);
        self.next_remap += 1;
        self.remaps.push(RemapSession::new(
            id,
            handler,
            listener,
            slot,
            on_complete,
            self.remap_timeout,
        ));
        info!(handler, listener, ?slot, "Listening for new key");
        Some(id)
    }

    /// Advance every remap session by one frame
    ///
    /// Returns the sessions that finished this frame. Stack caches are
    /// recomputed if any listener was rebound.
    pub fn tick_remaps<I: InputSource + ?Sized>(&mut self, input: &I) -> Vec<(RemapId, RemapStatus)> {
        let mut finished = Vec::new();
        let registry = &mut self.registry;
        self.remaps.retain_mut(|session| match session.poll(registry, input) {
            Some(status) => {
                finished.push((session.id, status));
                false
            }
            None => true,
        });

        let rebound = finished
            .iter()
            .any(|(_, status)| matches!(status, RemapStatus::Resolved { .. }));
        if rebound {
            self.update_stack();
        }
        finished
    }

    /// Cancel a running remap session. Returns false if it already finished.
    pub fn cancel_remap(&mut self, id: RemapId) -> bool {
        let before = self.remaps.len();
        self.remaps.retain(|session| session.id != id);
        let cancelled = self.remaps.len() != before;
        if cancelled {
            info!(?id, "Remap cancelled");
        }
        cancelled
    }

    pub fn is_remapping(&self, id: RemapId) -> bool {
        self.remaps.iter().any(|session| session.id == id)
    }

    /// Tear down the manager, handing back handlers and stack order so the
    /// next context can [`InputStack::resume`] them
    pub fn shutdown(self) -> PreservedStack {
        if !self.remaps.is_empty() {
            debug!(pending = self.remaps.len(), "Dropping pending remaps on shutdown");
        }
        info!(handlers = self.registry.len(), depth = self.stack.len(), "Input stack shut down");
        PreservedStack {
            handlers: self.registry.into_handlers(),
            stack: self.stack,
            remap_timeout: self.remap_timeout,
            store: self.store,
        }
    }

    /// Rebuild a manager from a preserved stack
    ///
    /// Stack entries whose handler is no longer among the preserved handlers
    /// are dropped; the rest keep their order.
    pub fn resume(preserved: PreservedStack) -> Self {
        let mut stack = Self::new(preserved.store).with_remap_timeout(preserved.remap_timeout);
        for handler in preserved.handlers {
            stack.registry.insert(handler);
        }
        for name in preserved.stack {
            if stack.registry.contains(&name) && !stack.contains(&name) {
                stack.stack.push(name);
            } else {
                debug!(handler = %name, "Dropping stale stack entry");
            }
        }
        stack.update_stack();
        info!(depth = stack.stack.len(), "Input stack resumed");
        stack
    }

    /// Stacked handler names with their blocking flags, top first
    pub fn debug_stack(&self) -> String {
        let mut out = String::new();
        for handler in self.iter() {
            let policy = handler.policy();
            let _ = writeln!(
                out,
                "{} (hard_block_keys: {}, block_keys: {}, hard_block_axes: {})",
                handler.name(),
                policy.hard_block_keys,
                policy.block_keys,
                policy.hard_block_axes
            );
        }
        out
    }

    /// Polled keys, one per line
    pub fn debug_key_codes(&self) -> String {
        let mut out = String::new();
        for key in &self.keys {
            let _ = writeln!(out, "{key}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::handler::HandlerPolicy;
    use crate::input::store::MemoryStore;
    use std::rc::Rc;

    fn stack() -> InputStack {
        InputStack::new(Rc::new(MemoryStore::new()))
    }

    #[test]
    fn test_push_requires_registration_and_uniqueness() {
        let mut stack = stack();
        assert!(!stack.push("Ghost"));

        assert!(stack.register(HandlerTemplate::new("A")));
        assert!(!stack.register(HandlerTemplate::new("A")));
        assert!(stack.push("A"));
        assert!(!stack.push("A"));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_push_handler_registers_initializes_and_pushes() {
        let mut stack = stack();
        let handler = Handler::new(
            HandlerTemplate::new("Menu").with_listener(
                KeyEvent::PressStart,
                "Confirm",
                Some(KeyCode::Enter),
                None,
            ),
            stack.store().clone(),
        );
        assert!(!handler.is_initialized());

        assert!(stack.push_handler(handler).is_ok());
        assert!(stack.registry().contains("Menu"));
        assert!(stack.handler("Menu").unwrap().is_initialized());
        assert_eq!(stack.top().map(Handler::name), Some("Menu"));
        assert_eq!(stack.key_codes(), &[KeyCode::Enter]);
    }

    #[test]
    fn test_push_handler_hands_back_duplicate() {
        let mut stack = stack();
        stack.register(HandlerTemplate::new("Menu"));
        stack.register(HandlerTemplate::new("Game"));
        stack.push("Game");

        let duplicate = Handler::new(HandlerTemplate::new("Menu"), stack.store().clone());
        let returned = stack.push_handler(duplicate).unwrap_err();
        assert_eq!(returned.name(), "Menu");
        assert!(!returned.is_initialized());

        let names: Vec<&str> = stack.iter().map(Handler::name).collect();
        assert_eq!(names, vec!["Game"]);
        assert_eq!(stack.registry().len(), 2);
    }

    #[test]
    fn test_pop_and_remove_on_empty_stack_are_noops() {
        let mut stack = stack();
        assert_eq!(stack.pop(), None);
        assert!(!stack.remove("A"));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut stack = stack();
        for name in ["A", "B", "C"] {
            stack.register(HandlerTemplate::new(name));
            stack.push(name);
        }
        assert!(stack.remove("B"));
        let names: Vec<&str> = stack.iter().map(Handler::name).collect();
        assert_eq!(names, vec!["C", "A"]);
    }

    #[test]
    fn test_cursor_follows_top_and_persists_when_empty() {
        let mut stack = stack();
        let locked = HandlerPolicy {
            cursor: CursorPolicy::Locked,
            ..HandlerPolicy::default()
        };
        stack.register(HandlerTemplate::new("Game").with_policy(locked));
        stack.register(HandlerTemplate::new("Menu"));

        assert_eq!(stack.cursor(), CursorPolicy::Free);
        stack.push("Game");
        assert_eq!(stack.cursor(), CursorPolicy::Locked);
        stack.push("Menu");
        assert_eq!(stack.cursor(), CursorPolicy::Confined);
        stack.pop();
        stack.pop();
        assert_eq!(stack.cursor(), CursorPolicy::Locked);
    }

    #[test]
    fn test_merged_keys_are_deduplicated() {
        let mut stack = stack();
        stack.register(
            HandlerTemplate::new("A")
                .with_listener(KeyEvent::PressStart, "Use", Some(KeyCode::E), None)
                .with_listener(KeyEvent::PressEnd, "Use", Some(KeyCode::E), None),
        );
        stack.register(
            HandlerTemplate::new("B").with_listener(KeyEvent::Held, "Inspect", Some(KeyCode::E), Some(KeyCode::Q)),
        );
        stack.push("A");
        stack.push("B");
        assert_eq!(stack.key_codes(), &[KeyCode::E, KeyCode::Q]);
    }

    #[test]
    fn test_debug_listings() {
        let mut stack = stack();
        stack.register(HandlerTemplate::new("A").with_listener(
            KeyEvent::PressStart,
            "Use",
            Some(KeyCode::E),
            None,
        ));
        stack.push("A");
        assert!(stack.debug_stack().starts_with("A (hard_block_keys: false"));
        assert_eq!(stack.debug_key_codes(), "E\n");
    }
}
