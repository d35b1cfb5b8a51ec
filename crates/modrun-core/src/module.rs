//! WebAssembly module compilation.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's [`Module`]
//! that handles compilation, serialization, and deserialization.
//!
//! # Input Formats
//!
//! - **Binary**: `\0asm` modules, header-checked before compilation
//! - **Text**: WAT source, convenient for embedding small modules and for tests
//! - **Precompiled**: `.cwasm` artifacts produced by [`CompiledModule::serialize`]

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, instrument};
use wasmtime::{Engine, Module};

use modrun_common::RuntimeError;

/// A compiled WebAssembly module.
///
/// Immutable once built. Cloning is cheap and every clone shares the same
/// machine code, so one `CompiledModule` backs any number of instances.
#[derive(Clone)]
pub struct CompiledModule {
    /// The compiled Wasmtime module.
    inner: Module,

    /// Hash of the original bytes.
    content_hash: String,

    /// When this module was compiled.
    compiled_at: Instant,
}

impl CompiledModule {
    /// Compile binary or text module bytes.
    ///
    /// Bytes starting with the Wasm magic number are treated as a binary
    /// module; anything else is tried as WAT.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::CompilationFailed`] for malformed or
    /// unsupported input.
    pub fn compile(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        if bytes.starts_with(b"\0asm") {
            return Self::from_bytes(engine, bytes);
        }

        let wat = std::str::from_utf8(bytes).map_err(|_| {
            RuntimeError::compilation_failed("Invalid Wasm: bad magic number")
        })?;
        Self::from_wat(engine, wat)
    }

    /// Compile a binary module.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::new(engine, bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Core module compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        let module = Module::new(engine, wat).map_err(|e| {
            RuntimeError::compilation_failed(format!("WAT compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(wat.as_bytes());

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "WAT module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Load a pre-compiled module from disk.
    ///
    /// # Safety
    ///
    /// This deserializes machine code. Only load artifacts produced by
    /// [`serialize`](Self::serialize) with the same Wasmtime version and
    /// engine settings.
    #[allow(unsafe_code)]
    #[instrument(skip(engine, path))]
    pub fn from_precompiled(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let start = Instant::now();

        // SAFETY: artifacts are only ever written by `serialize`
        let module = unsafe { Module::deserialize_file(engine, path) }.map_err(|e| {
            RuntimeError::compilation_failed(format!(
                "Failed to load precompiled module from {}: {e}",
                path.display()
            ))
        })?;

        // {hash}.cwasm
        let content_hash = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        debug!(
            path = %path.display(),
            content_hash = %content_hash,
            duration_us = start.elapsed().as_micros(),
            "Precompiled module loaded"
        );

        Ok(Self {
            inner: module,
            content_hash,
            compiled_at: Instant::now(),
        })
    }

    /// Serialize the compiled module for AOT caching.
    pub fn serialize(&self) -> Result<Vec<u8>, RuntimeError> {
        self.inner.serialize().map_err(|e| {
            RuntimeError::compilation_failed(format!("Module serialization failed: {e}"))
        })
    }

    /// Get the content hash of the original bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get when this module was compiled.
    pub fn compiled_at(&self) -> Instant {
        self.compiled_at
    }

    /// Names of all exports.
    pub fn exports(&self) -> impl Iterator<Item = &str> {
        self.inner.exports().map(|e| e.name())
    }

    /// Get the inner Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Validate WebAssembly header (magic number and version).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), RuntimeError> {
        if bytes.len() < 8 {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: file too small",
            ));
        }

        if &bytes[0..4] != b"\0asm" {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: bad magic number",
            ));
        }

        if bytes[4..8] != [0x01, 0x00, 0x00, 0x00] {
            return Err(RuntimeError::compilation_failed(
                "Unsupported Wasm: not a version 1 core module",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WasmEngine;
    use modrun_common::EngineConfig;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    fn engine() -> WasmEngine {
        WasmEngine::new(&EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_validate_wasm_header_valid() {
        assert!(CompiledModule::validate_wasm_header(MINIMAL_WASM).is_ok());
    }

    #[test]
    fn test_validate_wasm_header_too_small() {
        let result = CompiledModule::validate_wasm_header(&[0x00, 0x61]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_wasm_header_component_version() {
        // Component binaries share the magic but use a different version/layer
        let component = &[0x00, 0x61, 0x73, 0x6d, 0x0d, 0x00, 0x01, 0x00];
        let result = CompiledModule::validate_wasm_header(component);
        assert!(matches!(result, Err(RuntimeError::CompilationFailed { .. })));
    }

    #[test]
    fn test_compute_hash() {
        let hash1 = compute_hash(b"hello");
        let hash2 = compute_hash(b"hello");
        let hash3 = compute_hash(b"world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 16);
    }

    #[test]
    fn test_compile_binary() {
        let engine = engine();
        let module = CompiledModule::compile(engine.inner(), MINIMAL_WASM).unwrap();
        assert!(!module.content_hash().is_empty());
        assert_eq!(module.exports().count(), 0);
    }

    #[test]
    fn test_compile_text() {
        let engine = engine();
        let wat = br#"(module (func (export "init")) (memory (export "memory") 1))"#;
        let module = CompiledModule::compile(engine.inner(), wat).unwrap();

        let mut exports: Vec<_> = module.exports().collect();
        exports.sort_unstable();
        assert_eq!(exports, ["init", "memory"]);
    }

    #[test]
    fn test_compile_garbage() {
        let engine = engine();

        let err = CompiledModule::compile(engine.inner(), &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, RuntimeError::CompilationFailed { .. }));

        let err = CompiledModule::compile(engine.inner(), b"(module (func").unwrap_err();
        assert!(matches!(err, RuntimeError::CompilationFailed { .. }));
    }

    #[test]
    fn test_serialize_round_trip_through_disk() {
        let engine = engine();
        let module = CompiledModule::compile(engine.inner(), MINIMAL_WASM).unwrap();

        let path = std::env::temp_dir().join(format!("{}.cwasm", module.content_hash()));
        std::fs::write(&path, module.serialize().unwrap()).unwrap();

        let loaded = CompiledModule::from_precompiled(engine.inner(), &path).unwrap();
        assert_eq!(loaded.content_hash(), module.content_hash());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_module_debug() {
        let engine = engine();
        let module = CompiledModule::from_bytes(engine.inner(), MINIMAL_WASM).unwrap();

        let debug_str = format!("{module:?}");
        assert!(debug_str.contains("CompiledModule"));
        assert!(debug_str.contains("content_hash"));
    }
}
