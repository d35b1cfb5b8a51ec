//! Static file capability.
//!
//! Gives guests read access to named static files through a
//! host-registered backend.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use modrun_common::{BackendError, CapabilityConfig, CapabilityError};

use crate::capability::Gate;

/// Backend for static files: filename in, contents out.
pub type StaticFileFn = dyn Fn(&str) -> Result<Vec<u8>, BackendError> + Send + Sync;

/// Read access to static files.
pub trait FileCapability: Send + Sync {
    /// Get the contents of `filename`.
    fn get_static(&self, filename: &str) -> Result<Vec<u8>, CapabilityError>;
}

/// The default file capability: a [`Gate`] over a [`StaticFileFn`].
pub type FileSource = Gate<StaticFileFn>;

impl Gate<StaticFileFn> {
    /// A file gate with no backend.
    pub fn file(config: CapabilityConfig) -> Self {
        Self::new("file", config)
    }

    /// Register `f` as the backend.
    #[must_use]
    pub fn with_static_fn<F>(self, f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<u8>, BackendError> + Send + Sync + 'static,
    {
        self.with_backend(Arc::new(f))
    }
}

impl FileCapability for Gate<StaticFileFn> {
    fn get_static(&self, filename: &str) -> Result<Vec<u8>, CapabilityError> {
        let backend = self.backend()?;
        backend(filename).map_err(CapabilityError::Backend)
    }
}

/// A backend serving files below `root`.
///
/// Absolute names and names containing `..` are rejected.
pub fn directory_backend(root: impl Into<PathBuf>) -> Arc<StaticFileFn> {
    let root = root.into();

    Arc::new(move |filename: &str| -> Result<Vec<u8>, BackendError> {
        let relative = Path::new(filename);

        let is_contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !is_contained {
            return Err(format!("refusing to read outside static root: {filename}").into());
        }

        Ok(std::fs::read(root.join(relative))?)
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_disabled_for_every_filename() {
        let with_backend = FileSource::file(CapabilityConfig::disabled())
            .with_static_fn(|_| Ok(b"data".to_vec()));
        let without_backend = FileSource::file(CapabilityConfig::disabled());

        for name in ["x", "a.txt", "", "../etc/passwd"] {
            for gate in [&with_backend, &without_backend] {
                let err = gate.get_static(name).unwrap_err();
                assert!(matches!(err, CapabilityError::NotEnabled { capability: "file" }));
            }
        }
    }

    #[test]
    fn test_enabled_without_backend() {
        let gate = FileSource::file(CapabilityConfig::enabled());

        let err = gate.get_static("a.txt").unwrap_err();
        assert!(matches!(err, CapabilityError::BackendUnset { capability: "file" }));
    }

    #[test]
    fn test_enabled_passes_through() {
        let gate = FileSource::file(CapabilityConfig::enabled()).with_static_fn(|name| {
            if name == "a.txt" {
                Ok(b"hello".to_vec())
            } else {
                Err(io::Error::new(io::ErrorKind::NotFound, name.to_string()).into())
            }
        });

        assert_eq!(gate.get_static("a.txt").unwrap(), b"hello");

        let err = gate.get_static("b.txt").unwrap_err();
        assert_eq!(err.to_string(), "b.txt");
        let CapabilityError::Backend(inner) = err else {
            panic!("expected backend error");
        };
        assert_eq!(
            inner.downcast::<io::Error>().unwrap().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_directory_backend() {
        let root = std::env::temp_dir().join(format!("modrun-static-{}", std::process::id()));
        std::fs::create_dir_all(root.join("sub")).unwrap();
        std::fs::write(root.join("sub/a.txt"), b"hello").unwrap();

        let backend = directory_backend(&root);

        assert_eq!(backend("sub/a.txt").unwrap(), b"hello");
        assert_eq!(backend("./sub/a.txt").unwrap(), b"hello");
        assert!(backend("../a.txt").is_err());
        assert!(backend("/etc/hostname").is_err());
        assert!(backend("missing.txt").is_err());

        let _ = std::fs::remove_dir_all(root);
    }
}
