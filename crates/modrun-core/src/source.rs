//! Module byte sources.
//!
//! A [`ModuleSource`] names a module and knows how to fetch its bytes. The
//! fetch happens on first use and its result is kept for the lifetime of
//! the source.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use modrun_common::RuntimeError;

type ByteLoader = dyn Fn() -> Result<Vec<u8>, RuntimeError> + Send + Sync;

/// A named, lazily loaded source of module bytes.
///
/// The loader runs at most once successfully. If it fails, nothing is
/// stored and the next [`bytes`](Self::bytes) call tries again.
pub struct ModuleSource {
    name: String,
    loader: Box<ByteLoader>,
    bytes: OnceCell<Arc<[u8]>>,
}

impl ModuleSource {
    /// Create a source backed by an arbitrary loader.
    ///
    /// Loader errors are reported as [`RuntimeError::Load`].
    pub fn new<F, E>(name: impl Into<String>, loader: F) -> Self
    where
        F: Fn() -> Result<Vec<u8>, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let name = name.into();
        let source_name = name.clone();

        Self {
            name,
            loader: Box::new(move || {
                loader().map_err(|e| RuntimeError::load(source_name.as_str(), e.to_string()))
            }),
            bytes: OnceCell::new(),
        }
    }

    /// Create a source from bytes already in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        let source_name = name.clone();
        let bytes: Arc<[u8]> = bytes.into().into();

        Self {
            name,
            loader: Box::new(move || {
                Err(RuntimeError::load(
                    source_name.as_str(),
                    "in-memory source has no loader",
                ))
            }),
            bytes: OnceCell::with_value(bytes),
        }
    }

    /// Create a source that reads a file on first use.
    ///
    /// The source is named after the file stem.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string();

        Self::new(name, move || {
            std::fs::read(&path).map_err(|e| format!("{}: {e}", path.display()))
        })
    }

    /// The module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` once bytes have been loaded successfully.
    pub fn is_loaded(&self) -> bool {
        self.bytes.get().is_some()
    }

    /// Get the module bytes, loading them on first call.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Load`] if the loader fails.
    pub fn bytes(&self) -> Result<Arc<[u8]>, RuntimeError> {
        self.bytes
            .get_or_try_init(|| {
                let bytes = (self.loader)()?;
                debug!(source = %self.name, bytes_len = bytes.len(), "Module bytes loaded");
                Ok(bytes.into())
            })
            .map(Arc::clone)
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleSource")
            .field("name", &self.name)
            .field("loaded", &self.is_loaded())
            .finish_non_exhaustive()
    }
}
