//! Application configuration
//!
//! Supports multiple profiles (debug, release) with different settings.

use std::path::PathBuf;
use std::rc::Rc;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::input::{HandlerTemplate, JsonFileStore, MemoryStore, SharedStore};

/// Where handler bindings are persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for per-handler JSON files; platform data dir if unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Key remapping settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemapConfig {
    /// Give up a remap after this many frames without a held key
    #[serde(default)]
    pub timeout_frames: Option<u32>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The active profile (debug, release, etc.)
    pub profile: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub remap: RemapConfig,
    /// Built-in handler definitions, used until a handler has saved bindings
    #[serde(default)]
    pub handlers: Vec<HandlerTemplate>,
}

impl AppConfig {
    /// Loads configuration based on the specified profile
    ///
    /// Profiles are loaded from config files in the following order:
    /// 1. config/{profile}.toml (profile-specific configuration)
    /// 2. Environment variables with prefix APP_ (e.g., APP_REMAP__TIMEOUT_FRAMES=300)
    ///
    /// Config files are searched for in:
    /// 1. Next to the executable (target/debug/config or target/release/config)
    /// 2. In the current directory (./config)
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        let config_dir = Self::find_config_dir();

        let mut builder = Config::builder();

        if let Some(ref dir) = config_dir {
            let profile_path = dir.join(profile);
            builder = builder.add_source(File::from(profile_path.as_path()).required(false));
        } else {
            builder =
                builder.add_source(File::with_name(&format!("config/{}", profile)).required(false));
        }

        // Use __ as separator for nested fields (e.g., APP_STORE__DIRECTORY)
        builder = builder.add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.set_override("profile", profile)?.build()?;

        config.try_deserialize()
    }

    /// Finds the config directory by searching in multiple locations
    fn find_config_dir() -> Option<PathBuf> {
        if let Ok(exe_path) = std::env::current_exe()
            && let Some(exe_dir) = exe_path.parent()
        {
            let config_dir = exe_dir.join("config");
            if config_dir.exists() {
                return Some(config_dir);
            }
        }

        let cwd_config = PathBuf::from("config");
        if cwd_config.exists() {
            return Some(cwd_config);
        }

        None
    }

    /// Loads configuration using the APP_PROFILE environment variable,
    /// defaulting to "release"
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let profile = std::env::var("APP_PROFILE").unwrap_or_else(|_| "release".to_string());
        Self::load(&profile)
    }

    /// Opens the configured handler store
    ///
    /// Falls back to an in-memory store when no directory is configured and
    /// the platform has no data directory.
    pub fn open_store(&self) -> SharedStore {
        let store = match &self.store.directory {
            Some(dir) => JsonFileStore::new(dir),
            None => match JsonFileStore::in_data_dir() {
                Some(store) => store,
                None => {
                    warn!("No data directory available, handler bindings will not persist");
                    return Rc::new(MemoryStore::new());
                }
            },
        };
        debug!(dir = %store.dir().display(), "Handler bindings stored on disk");
        Rc::new(store)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::load("release").unwrap_or_else(|_| Self {
            profile: "release".to_string(),
            store: StoreConfig::default(),
            remap: RemapConfig::default(),
            handlers: Vec::new(),
        })
    }
}
