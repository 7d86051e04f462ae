//! Configuration defaults and the models directory list.
//!
//! Constants for environment variables and defaults live here so the library and the
//! CLI agree on them. `ModelsConfig` is the persisted form of a models manager's
//! directory list.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable names.
pub mod env_vars {
    /// OS path-list of extra model directories, appended after the configured ones.
    pub const MODELS_PATH: &str = "PROCSIM_MODELS_PATH";
    /// Path of the TOML configuration file.
    pub const CONFIG_FILE: &str = "PROCSIM_CONFIG";
    /// Set to `true` to emit JSON logs.
    pub const LOG_JSON: &str = "PROCSIM_LOG_JSON";
}

/// Default values.
pub mod defaults {
    /// Configuration file looked up in the working directory.
    pub const CONFIG_FILE_NAME: &str = "procsim.toml";
    /// Log filter used when `RUST_LOG` is unset.
    pub const LOG_FILTER: &str = "procsim=info";
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Cannot serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// One configured models directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirConfig {
    pub path: PathBuf,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl DirConfig {
    pub fn new(path: impl Into<PathBuf>, active: bool) -> Self {
        Self {
            path: path.into(),
            active,
        }
    }
}

/// Ordered list of model directories. Order is priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub dirs: Vec<DirConfig>,
}

impl ModelsConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Serialize the configuration to TOML text.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Write the configuration to a file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Append an active directory unless the same path is already listed.
    pub fn push_dir(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.dirs.iter().any(|d| d.path == path) {
            return false;
        }
        self.dirs.push(DirConfig::new(path, true));
        true
    }

    /// Append the directories of an OS path-list (as found in `PROCSIM_MODELS_PATH`).
    pub fn extend_from_path_list(&mut self, list: &OsStr) {
        for path in std::env::split_paths(list) {
            if !path.as_os_str().is_empty() {
                self.push_dir(path);
            }
        }
    }

    /// Append the directories named by the `PROCSIM_MODELS_PATH` environment variable.
    pub fn with_env(mut self) -> Self {
        if let Some(list) = std::env::var_os(env_vars::MODELS_PATH) {
            self.extend_from_path_list(&list);
        }
        self
    }
}
