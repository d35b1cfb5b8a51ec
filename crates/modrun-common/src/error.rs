//! Error types for modrun.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`RuntimeError`]: Failures of the build/instantiate/start pipeline
//! - [`CapabilityError`]: Failures answered by a capability gate
//! - [`FailureStage`]: Which pipeline stage a [`RuntimeError`] belongs to

use std::io;

use thiserror::Error;

use crate::EntryStage;

/// Error produced by a capability backend.
///
/// Gates never inspect it; it is handed back to the caller as-is.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level runtime errors.
///
/// Every fatal variant maps to exactly one [`FailureStage`] so callers can
/// tell where `RuntimeBuilder::new_instance` gave up without matching on messages.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The module byte source could not be read.
    #[error("Failed to load module '{source_name}': {reason}")]
    Load {
        /// Name of the module source.
        source_name: String,
        /// Description of the load failure.
        reason: String,
    },

    /// WebAssembly compilation failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// The import environment (WASI) could not be generated.
    ///
    /// The builder recovers from this by continuing with an empty import set.
    #[error("Import generation failed: {reason}")]
    ImportGeneration {
        /// Description of the generation failure.
        reason: String,
    },

    /// Two host functions were registered under the same import name.
    #[error("Duplicate host function: {module}::{name}")]
    DuplicateHostFunction {
        /// Import module name.
        module: String,
        /// Import field name.
        name: String,
    },

    /// A host function could not be defined on the linker.
    #[error("Failed to bind host function {module}::{name}: {reason}")]
    Binding {
        /// Import module name.
        module: String,
        /// Import field name.
        name: String,
        /// Description of the binding failure.
        reason: String,
    },

    /// Instantiating the compiled module failed.
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// The resolved entry export failed.
    #[error("Entry point '{stage}' failed: {reason}")]
    EntryPoint {
        /// Which entry tier was running.
        stage: EntryStage,
        /// Description of the failure.
        reason: String,
    },

    /// A requested export does not exist or has the wrong type.
    #[error("Export not found: {name}")]
    ExportNotFound {
        /// The export that was requested.
        name: String,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// A WebAssembly trap occurred during a call.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// A capability gate refused or failed a request.
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// Errors answered by a capability gate.
///
/// These are ordinary return values: a guest or host probing a capability
/// gets one of these back and keeps running.
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// The capability is disabled by configuration.
    #[error("capability not enabled: {capability}")]
    NotEnabled {
        /// Capability kind, e.g. `file`.
        capability: &'static str,
    },

    /// The capability is enabled but no backend was registered.
    #[error("capability backend not set: {capability}")]
    BackendUnset {
        /// Capability kind, e.g. `file`.
        capability: &'static str,
    },

    /// The backend itself failed.
    #[error(transparent)]
    Backend(BackendError),
}

/// Pipeline stage a [`RuntimeError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Reading module bytes.
    Load,
    /// Compiling module bytes.
    Compile,
    /// Generating imports or binding host functions.
    Bind,
    /// Instantiating the module.
    Instantiate,
    /// Running the entry point.
    Entry,
    /// Calling into a ready instance.
    Call,
    /// Configuration, I/O, or capability use outside the pipeline.
    Config,
}

impl RuntimeError {
    /// Create a new `Load` error.
    pub fn load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `ImportGeneration` error.
    pub fn import_generation(reason: impl Into<String>) -> Self {
        Self::ImportGeneration {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `EntryPoint` error.
    pub fn entry_point(stage: EntryStage, reason: impl Into<String>) -> Self {
        Self::EntryPoint {
            stage,
            reason: reason.into(),
        }
    }

    /// Create a new `ExportNotFound` error.
    pub fn export_not_found(name: impl Into<String>) -> Self {
        Self::ExportNotFound { name: name.into() }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> FailureStage {
        match self {
            Self::Load { .. } => FailureStage::Load,
            Self::CompilationFailed { .. } => FailureStage::Compile,
            Self::ImportGeneration { .. }
            | Self::DuplicateHostFunction { .. }
            | Self::Binding { .. } => FailureStage::Bind,
            Self::InstantiationFailed { .. } => FailureStage::Instantiate,
            Self::EntryPoint { .. } => FailureStage::Entry,
            Self::ExportNotFound { .. } | Self::FuelExhausted | Self::Trap { .. } => {
                FailureStage::Call
            }
            Self::Capability(_) | Self::Io(_) | Self::InvalidConfig { .. } => FailureStage::Config,
        }
    }

    /// Returns `true` if a later attempt may succeed.
    ///
    /// Load and compile failures leave nothing cached, so the next
    /// `RuntimeBuilder::new_instance` call starts over.
    pub fn is_retryable(&self) -> bool {
        matches!(self.stage(), FailureStage::Load | FailureStage::Compile)
    }

    /// The entry stage that failed, if this is an entry-point error.
    pub fn entry_stage(&self) -> Option<EntryStage> {
        match self {
            Self::EntryPoint { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl CapabilityError {
    /// Wrap a backend failure.
    pub fn backend(err: impl Into<BackendError>) -> Self {
        Self::Backend(err.into())
    }

    /// Returns `true` if the gate refused without calling anything.
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::NotEnabled { .. } | Self::BackendUnset { .. })
    }
}
