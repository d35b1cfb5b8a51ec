//! Wasmtime engine configuration and creation.
//!
//! The [`WasmEngine`] is the foundation of the runtime. It is:
//! - Thread-safe and shared by every builder and instance created from it
//! - Synchronous: instantiation and entry points run on the calling thread
//! - Optionally fuel-metered and backed by the pooling allocator

use std::sync::Arc;

use tracing::info;
use wasmtime::{Config, Engine, InstanceAllocationStrategy, PoolingAllocationConfig};

use modrun_common::{EngineConfig, RuntimeError};

/// Thread-safe WebAssembly engine wrapper.
///
/// # Example
///
/// ```ignore
/// use modrun_common::EngineConfig;
/// use modrun_core::WasmEngine;
///
/// let engine = WasmEngine::new(&EngineConfig::default())?;
/// ```
#[derive(Clone)]
pub struct WasmEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is rejected, e.g. a
    /// pooling allocator that cannot reserve its slots.
    pub fn new(config: &EngineConfig) -> Result<Self, RuntimeError> {
        let mut wasmtime_config = Config::new();

        // Entry points and host functions are plain blocking calls
        wasmtime_config.async_support(false);

        wasmtime_config.consume_fuel(config.fuel_metering);

        wasmtime_config.cranelift_opt_level(wasmtime::OptLevel::Speed);

        if config.pooling_allocator {
            let pooling_config = Self::create_pooling_config(config);

            wasmtime_config
                .allocation_strategy(InstanceAllocationStrategy::Pooling(pooling_config));

            info!(
                max_instances = config.max_instances,
                instance_memory_mb = config.instance_memory_mb,
                "Pooling allocator enabled"
            );
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            RuntimeError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        info!(fuel_metering = config.fuel_metering, "Wasmtime engine initialized");

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
        })
    }

    /// Create pooling allocation configuration.
    fn create_pooling_config(config: &EngineConfig) -> PoolingAllocationConfig {
        let mut pooling = PoolingAllocationConfig::default();

        pooling.total_core_instances(config.max_instances);
        pooling.total_memories(config.max_instances);
        pooling.total_tables(config.max_instances);

        let max_memory_bytes = (config.instance_memory_mb as usize) * 1024 * 1024;
        pooling.max_memory_size(max_memory_bytes);

        pooling
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Check if fuel metering is enabled.
    pub fn is_fuel_metered(&self) -> bool {
        self.config.fuel_metering
    }

    /// Check if the pooling allocator is enabled.
    pub fn is_pooling_enabled(&self) -> bool {
        self.config.pooling_allocator
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("pooling_allocator", &self.config.pooling_allocator)
            .field("fuel_metering", &self.config.fuel_metering)
            .finish_non_exhaustive()
    }
}
