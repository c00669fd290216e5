//! Registry of live handlers, keyed by their unique name

use indexmap::IndexMap;
use tracing::{debug, info};

use super::handler::Handler;

/// Owns every live handler; lookup by name, iteration in registration order
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: IndexMap<String, Handler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize and register a handler
    ///
    /// Returns false and leaves the registry unchanged if a handler with the
    /// same name is already registered.
    pub fn insert(&mut self, mut handler: Handler) -> bool {
        if self.handlers.contains_key(handler.name()) {
            debug!(handler = handler.name(), "Handler already registered");
            return false;
        }
        handler.initialize();
        info!(handler = handler.name(), "Registered handler");
        self.handlers.insert(handler.name().to_string(), handler);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Handler> {
        self.handlers.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Deregister a handler, keeping the order of the others
    pub fn remove(&mut self, name: &str) -> Option<Handler> {
        let handler = self.handlers.shift_remove(name)?;
        info!(handler = name, "Deregistered handler");
        Some(handler)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Handler> {
        self.handlers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Handler> {
        self.handlers.values_mut()
    }

    pub(crate) fn into_handlers(self) -> Vec<Handler> {
        self.handlers.into_values().collect()
    }
}
