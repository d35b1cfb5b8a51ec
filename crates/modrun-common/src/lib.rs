//! Common types, errors, and configuration for modrun.
//!
//! This crate provides shared functionality used across the modrun workspace:
//! - Error types using `thiserror`, tagged with the pipeline stage that failed
//! - Entry-point stage identifiers
//! - Configuration structures and TOML loading

pub mod config;
pub mod config_file;
pub mod entry;
pub mod error;

pub use config::{CapabilitiesConfig, CapabilityConfig, EngineConfig, RuntimeConfig, WasiConfig};
pub use config_file::{ConfigFile, ConfigFileError, ModuleEntry};
pub use entry::EntryStage;
pub use error::{BackendError, CapabilityError, FailureStage, RuntimeError};
