//! Runtime builder: compile once, instantiate many.
//!
//! [`RuntimeBuilder::new_instance`] runs the full pipeline for one caller:
//!
//! 1. Compile the module (first successful call only)
//! 2. Generate the import set and bind host functions (first successful call only)
//! 3. Instantiate against the import set
//! 4. Resolve and run the entry point
//!
//! Steps 1 and 2 are cached on the builder. A failure in either leaves
//! nothing behind and the next call retries. Failures in steps 3 and 4
//! only affect the current call.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use wasmtime::Linker;

use crate::entry::run_entry_point;
use crate::imports::{HostFunctionTable, ImportEnvironment, WasiEnvironment};
use crate::instance::RuntimeInstance;
use crate::source::ModuleSource;
use crate::store::{InstanceContext, create_store};
use crate::{CompiledModule, WasmEngine};
use modrun_common::{RuntimeError, WasiConfig};

/// Snapshot of a builder's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuilderStats {
    /// Successful compilations. Never exceeds one.
    pub compilations: u64,

    /// Instances handed back to callers.
    pub instances_created: u64,

    /// Times import generation failed and an empty import set was used.
    pub import_fallbacks: u64,
}

#[derive(Default)]
struct Counters {
    compilations: AtomicU64,
    instances_created: AtomicU64,
    import_fallbacks: AtomicU64,
}

/// Produces started instances of one module.
///
/// Share it by reference (or in an `Arc`) across threads; every method
/// takes `&self`.
///
/// # Example
///
/// ```ignore
/// use modrun_core::{ModuleSource, RuntimeBuilder, WasmEngine};
///
/// let engine = WasmEngine::new(&EngineConfig::default())?;
/// let builder = RuntimeBuilder::new(engine, ModuleSource::from_file("hello.wasm"))
///     .with_host_functions(table);
///
/// let mut instance = builder.new_instance()?;
/// instance.call("run")?;
/// ```
pub struct RuntimeBuilder {
    engine: WasmEngine,
    source: ModuleSource,
    host_fns: HostFunctionTable,
    environment: Arc<dyn ImportEnvironment>,
    wasi: WasiConfig,
    compiled: OnceCell<Arc<CompiledModule>>,
    linker: OnceCell<Linker<InstanceContext>>,
    counters: Counters,
}

impl RuntimeBuilder {
    /// Create a builder for `source` with the WASI environment and no host functions.
    pub fn new(engine: WasmEngine, source: ModuleSource) -> Self {
        Self {
            engine,
            source,
            host_fns: HostFunctionTable::new(),
            environment: Arc::new(WasiEnvironment),
            wasi: WasiConfig::default(),
            compiled: OnceCell::new(),
            linker: OnceCell::new(),
            counters: Counters::default(),
        }
    }

    /// Use `table` as the host functions for every instance.
    #[must_use]
    pub fn with_host_functions(mut self, table: HostFunctionTable) -> Self {
        self.host_fns = table;
        self
    }

    /// Replace the import environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl ImportEnvironment + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    /// Configure the WASI context given to each instance.
    #[must_use]
    pub fn with_wasi(mut self, wasi: WasiConfig) -> Self {
        self.wasi = wasi;
        self
    }

    /// The module name.
    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// The engine instances run on.
    pub fn engine(&self) -> &WasmEngine {
        &self.engine
    }

    /// Returns `true` once the module has been compiled.
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Current counter values.
    pub fn stats(&self) -> BuilderStats {
        BuilderStats {
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            instances_created: self.counters.instances_created.load(Ordering::Relaxed),
            import_fallbacks: self.counters.import_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Create, instantiate and start a new instance.
    ///
    /// Blocks until the entry point returns. Concurrent first calls share
    /// a single compilation.
    ///
    /// # Errors
    ///
    /// Returns, by stage:
    /// - [`RuntimeError::Load`] / [`RuntimeError::CompilationFailed`]: nothing cached, retryable
    /// - [`RuntimeError::Binding`]: host functions clash with the environment
    /// - [`RuntimeError::InstantiationFailed`]: this call only
    /// - [`RuntimeError::EntryPoint`]: the entry export failed; the instance is dropped
    #[instrument(skip(self), fields(module = %self.source.name()))]
    pub fn new_instance(&self) -> Result<RuntimeInstance, RuntimeError> {
        let start = Instant::now();

        let module = self.compiled_module()?;
        let linker = self.linker()?;

        let mut store = create_store(&self.engine, &self.wasi, self.source.name())?;

        debug!("Instantiating module");

        let instance = linker
            .instantiate(&mut store, module.inner())
            .map_err(|e| RuntimeError::instantiation_failed(format!("{e:#}")))?;

        let entry_stage = run_entry_point(&mut store, &instance)?;

        self.counters.instances_created.fetch_add(1, Ordering::Relaxed);

        info!(
            instance_id = %store.data().instance_id,
            entry_stage = ?entry_stage,
            duration_us = start.elapsed().as_micros(),
            "Instance ready"
        );

        Ok(RuntimeInstance::new(store, instance, module, entry_stage))
    }

    /// Get the compiled module, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Returns the load or compile error; nothing is cached on failure.
    pub fn compiled_module(&self) -> Result<Arc<CompiledModule>, RuntimeError> {
        self.compiled
            .get_or_try_init(|| {
                let bytes = self.source.bytes()?;
                let module = CompiledModule::compile(self.engine.inner(), &bytes)?;
                self.counters.compilations.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::new(module))
            })
            .map(Arc::clone)
    }

    fn linker(&self) -> Result<&Linker<InstanceContext>, RuntimeError> {
        self.linker.get_or_try_init(|| {
            let mut linker = Linker::new(self.engine.inner());

            if let Err(e) = self.environment.generate(&mut linker) {
                warn!(
                    error = %e,
                    "Import generation failed, continuing with an empty import set"
                );
                self.counters.import_fallbacks.fetch_add(1, Ordering::Relaxed);
                linker = Linker::new(self.engine.inner());
            }

            self.host_fns.bind(&mut linker)?;

            debug!(host_functions = self.host_fns.len(), "Import set bound");
            Ok(linker)
        })
    }
}

impl std::fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("module", &self.source.name())
            .field("compiled", &self.is_compiled())
            .field("host_functions", &self.host_fns.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modrun_common::EngineConfig;

    fn builder(wat: &str) -> RuntimeBuilder {
        let engine = WasmEngine::new(&EngineConfig::default()).unwrap();
        RuntimeBuilder::new(engine, ModuleSource::from_bytes("test", wat))
    }

    #[test]
    fn test_builder_is_lazy() {
        let builder = builder("(module)");
        assert!(!builder.is_compiled());
        assert_eq!(builder.stats(), BuilderStats::default());
    }

    #[test]
    fn test_new_instance_compiles_once() {
        let builder = builder("(module)");

        builder.new_instance().unwrap();
        builder.new_instance().unwrap();

        let stats = builder.stats();
        assert!(builder.is_compiled());
        assert_eq!(stats.compilations, 1);
        assert_eq!(stats.instances_created, 2);
        assert_eq!(stats.import_fallbacks, 0);
    }

    #[test]
    fn test_builder_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuntimeBuilder>();
    }

    #[test]
    fn test_compiled_module_is_shared() {
        let builder = builder("(module (func (export \"init\")))");

        let first = builder.compiled_module().unwrap();
        let second = builder.compiled_module().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.exports().collect::<Vec<_>>(), ["init"]);
        assert_eq!(builder.stats().compilations, 1);
    }

    #[test]
    fn test_builder_debug() {
        let builder = builder("(module)");
        let debug_str = format!("{builder:?}");
        assert!(debug_str.contains("RuntimeBuilder"));
        assert!(debug_str.contains("test"));
    }
}
