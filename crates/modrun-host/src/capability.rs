//! Capability gates.
//!
//! A [`Gate`] stands between guest-facing host functions and a backend
//! supplied by the embedder. It answers every request in the same order:
//!
//! 1. Disabled by configuration → [`CapabilityError::NotEnabled`]
//! 2. No backend registered → [`CapabilityError::BackendUnset`]
//! 3. Otherwise the backend is called and its answer returned as-is
//!
//! `Gate` is generic over the backend type, so each capability kind
//! defines its own backend signature and operation trait (see
//! [`crate::file`] and [`crate::logging`]) without sharing an inheritance
//! chain.

use std::fmt;
use std::sync::Arc;

use modrun_common::{CapabilitiesConfig, CapabilityConfig, CapabilityError};

use crate::file::{FileCapability, FileSource};
use crate::logging::{LogCapability, LogSource};

/// A configured gate around an optional backend.
pub struct Gate<B: ?Sized> {
    kind: &'static str,
    config: CapabilityConfig,
    backend: Option<Arc<B>>,
}

impl<B: ?Sized> Gate<B> {
    /// A gate of `kind` with no backend.
    pub fn new(kind: &'static str, config: CapabilityConfig) -> Self {
        Self {
            kind,
            config,
            backend: None,
        }
    }

    /// Register the backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<B>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Capability kind, e.g. `file`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// The gate's configuration.
    pub fn config(&self) -> CapabilityConfig {
        self.config
    }

    /// Returns `true` if a backend is registered.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// The backend, if this gate lets requests through.
    ///
    /// # Errors
    ///
    /// [`CapabilityError::NotEnabled`] when disabled (whether or not a
    /// backend exists), else [`CapabilityError::BackendUnset`] when no
    /// backend is registered.
    pub fn backend(&self) -> Result<&B, CapabilityError> {
        if !self.config.enabled {
            return Err(CapabilityError::NotEnabled {
                capability: self.kind,
            });
        }

        self.backend
            .as_deref()
            .ok_or(CapabilityError::BackendUnset {
                capability: self.kind,
            })
    }
}

impl<B: ?Sized> Clone for Gate<B> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            config: self.config,
            backend: self.backend.clone(),
        }
    }
}

impl<B: ?Sized> fmt::Debug for Gate<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("kind", &self.kind)
            .field("enabled", &self.config.enabled)
            .field("has_backend", &self.has_backend())
            .finish()
    }
}

/// Every capability handed to host functions.
#[derive(Clone)]
pub struct Capabilities {
    /// Static file access.
    pub file: Arc<dyn FileCapability>,

    /// Guest logging.
    pub logging: Arc<dyn LogCapability>,
}

impl Capabilities {
    /// Build gates from configuration.
    ///
    /// The file gate starts without a backend; logging goes to `tracing`.
    pub fn from_config(config: &CapabilitiesConfig) -> Self {
        Self {
            file: Arc::new(FileSource::file(config.file)),
            logging: Arc::new(LogSource::logging(config.logging)),
        }
    }

    /// Replace the file capability.
    #[must_use]
    pub fn with_file(mut self, file: impl FileCapability + 'static) -> Self {
        self.file = Arc::new(file);
        self
    }

    /// Replace the logging capability.
    #[must_use]
    pub fn with_logging(mut self, logging: impl LogCapability + 'static) -> Self {
        self.logging = Arc::new(logging);
        self
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::from_config(&CapabilitiesConfig::default())
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Echo = dyn Fn(&str) -> String + Send + Sync;

    fn echo() -> Arc<Echo> {
        Arc::new(|s: &str| s.to_uppercase())
    }

    #[test]
    fn test_disabled_gate_refuses_even_with_backend() {
        let gate = Gate::<Echo>::new("echo", CapabilityConfig::disabled()).with_backend(echo());

        let err = gate.backend().unwrap_err();
        assert!(matches!(err, CapabilityError::NotEnabled { capability: "echo" }));
    }

    #[test]
    fn test_enabled_gate_without_backend() {
        let gate = Gate::<Echo>::new("echo", CapabilityConfig::enabled());

        let err = gate.backend().unwrap_err();
        assert!(matches!(err, CapabilityError::BackendUnset { capability: "echo" }));
        assert!(err.is_refusal());
    }

    #[test]
    fn test_enabled_gate_with_backend() {
        let gate = Gate::<Echo>::new("echo", CapabilityConfig::enabled()).with_backend(echo());

        let backend = gate.backend().unwrap();
        assert_eq!(backend("hi"), "HI");
    }

    #[test]
    fn test_gate_debug() {
        let gate = Gate::<Echo>::new("echo", CapabilityConfig::enabled());
        let debug_str = format!("{gate:?}");
        assert!(debug_str.contains("echo"));
        assert!(debug_str.contains("has_backend: false"));
    }

    #[test]
    fn test_default_capabilities_are_closed() {
        let caps = Capabilities::default();
        assert!(caps.file.get_static("x").is_err());
    }
}
