//! Configuration file structures for modrun.
//!
//! This module defines structures for TOML configuration files:
//! - [`ConfigFile`]: Top-level configuration file structure
//! - [`ModuleEntry`]: A named module on disk

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::RuntimeConfig;

/// Top-level configuration file structure.
///
/// # Example
///
/// ```toml
/// static_dir = "./static"
///
/// [runtime.engine]
/// fuel_metering = true
/// max_fuel = 5_000_000
///
/// [runtime.capabilities.file]
/// enabled = true
///
/// [runtime.capabilities.logging]
/// enabled = true
///
/// [runtime.wasi]
/// inherit_stdio = true
/// args = ["--verbose"]
///
/// [[modules]]
/// name = "hello"
/// path = "./modules/hello.wasm"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Runtime configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Directory served by the static file capability.
    #[serde(default)]
    pub static_dir: Option<String>,

    /// Known modules.
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

impl ConfigFile {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigFileError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        toml::from_str(content).map_err(|e| ConfigFileError::Parse {
            message: e.to_string(),
        })
    }

    /// Find a module entry by name.
    pub fn module(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// A module known to the configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleEntry {
    /// Module name, accepted in place of a path on the command line.
    pub name: String,

    /// Path to the WebAssembly binary or text file.
    pub path: String,
}

/// Configuration file errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("Failed to parse config file: {message}")]
    Parse { message: String },
}
