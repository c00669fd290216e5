//! Persistence of handler bindings
//!
//! Handlers load their listeners and axes once at initialization and save
//! them after every structural change. The store itself is an external
//! collaborator; two implementations ship here: [`MemoryStore`] and a
//! one-file-per-handler [`JsonFileStore`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::axis::Axis;
use super::key::KeyEvent;
use super::listener::ListenerDef;

/// Saved listener tables and axes of one handler
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub name: String,
    #[serde(default)]
    pub press_start: Vec<ListenerDef>,
    #[serde(default)]
    pub held: Vec<ListenerDef>,
    #[serde(default)]
    pub press_end: Vec<ListenerDef>,
    #[serde(default)]
    pub axes: Vec<Axis>,
}

impl HandlerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn listeners(&self, event: KeyEvent) -> &[ListenerDef] {
        match event {
            KeyEvent::PressStart => &self.press_start,
            KeyEvent::Held => &self.held,
            KeyEvent::PressEnd => &self.press_end,
        }
    }
}

/// Errors from reading or writing handler configs
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("handler name {0:?} cannot be used as a file name")]
    InvalidName(String),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed handler config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Durable storage for handler configs
pub trait HandlerStore {
    /// Saved config for `handler`, or `None` if nothing was saved yet
    fn load(&self, handler: &str) -> Result<Option<HandlerConfig>, StoreError>;

    /// Persist `config`, replacing any previous save under the same name
    fn save(&self, config: &HandlerConfig) -> Result<(), StoreError>;
}

/// Store shared by every handler of a stack
pub type SharedStore = Rc<dyn HandlerStore>;

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    configs: RefCell<HashMap<String, HandlerConfig>>,
    saves: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a config as if it had been saved earlier
    pub fn insert(&self, config: HandlerConfig) {
        self.configs.borrow_mut().insert(config.name.clone(), config);
    }

    pub fn get(&self, handler: &str) -> Option<HandlerConfig> {
        self.configs.borrow().get(handler).cloned()
    }

    /// Number of saves performed so far
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }
}

impl HandlerStore for MemoryStore {
    fn load(&self, handler: &str) -> Result<Option<HandlerConfig>, StoreError> {
        Ok(self.get(handler))
    }

    fn save(&self, config: &HandlerConfig) -> Result<(), StoreError> {
        self.saves.set(self.saves.get() + 1);
        self.insert(config.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per handler
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory, if one can be determined
    pub fn in_data_dir() -> Option<Self> {
        directories::ProjectDirs::from("", "", "keystack")
            .map(|dirs| Self::new(dirs.data_dir().join("handlers")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, handler: &str) -> Result<PathBuf, StoreError> {
        let invalid = handler.is_empty()
            || handler == "."
            || handler == ".."
            || handler.contains(['/', '\\']);
        if invalid {
            return Err(StoreError::InvalidName(handler.to_string()));
        }
        Ok(self.dir.join(format!("{handler}.json")))
    }
}

impl HandlerStore for JsonFileStore {
    fn load(&self, handler: &str) -> Result<Option<HandlerConfig>, StoreError> {
        let path = self.path_for(handler)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let config = serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        debug!(handler, path = %path.display(), "Loaded handler config");
        Ok(Some(config))
    }

    fn save(&self, config: &HandlerConfig) -> Result<(), StoreError> {
        let path = self.path_for(&config.name)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let text = serde_json::to_string_pretty(config).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, text).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(handler = %config.name, path = %path.display(), "Saved handler config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::key::KeyCode;

    fn sample() -> HandlerConfig {
        let mut config = HandlerConfig::new("Movement");
        config
            .press_start
            .push(ListenerDef::new("Jump", Some(KeyCode::Space), None));
        config
            .held
            .push(ListenerDef::new("Forward", Some(KeyCode::W), Some(KeyCode::Up)));
        config.axes.push(Axis::new("Horizontal", "joy0_x"));
        config
    }

    #[test]
    fn test_json_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("Movement").unwrap().is_none());
    }

    #[test]
    fn test_json_store_persists_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        store.save(&sample()).unwrap();

        assert_eq!(store.dir(), dir.path().join("nested"));
        assert!(dir.path().join("nested").join("Movement.json").exists());
        assert_eq!(store.load("Movement").unwrap(), Some(sample()));
    }

    #[test]
    fn test_json_store_rejects_path_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(
            store.load("../escape"),
            Err(StoreError::InvalidName(_))
        ));
        assert!(matches!(
            store.save(&HandlerConfig::new("")),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_json_store_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Broken.json"), "{ not json").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(store.load("Broken"), Err(StoreError::Json { .. })));
    }

    #[test]
    fn test_missing_tables_default_to_empty() {
        let config: HandlerConfig = serde_json::from_str(r#"{ "name": "Menu" }"#).unwrap();
        assert!(config.press_start.is_empty());
        assert!(config.axes.is_empty());
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStore::new();
        store.save(&sample()).unwrap();
        store.save(&sample()).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load("Movement").unwrap(), Some(sample()));
    }
}
