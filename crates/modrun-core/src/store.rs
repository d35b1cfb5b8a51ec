//! Per-instance store data.
//!
//! This module provides:
//! - [`InstanceContext`]: State owned by one instance, reachable from host functions
//! - [`LogEntry`] and [`LogLevel`]: Log lines emitted by guest code
//! - [`ExecutionMetrics`]: Counters for calls made into the instance

use std::time::{Duration, Instant};

use uuid::Uuid;
use wasmtime::Store;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;
use modrun_common::{RuntimeError, WasiConfig};

/// Data stored alongside one instance.
///
/// Host functions reach it through [`wasmtime::Caller::data_mut`]. It is
/// never shared between instances.
pub struct InstanceContext {
    /// WASI preview 1 context.
    wasi: WasiP1Ctx,

    /// Unique instance identifier for tracing.
    pub instance_id: String,

    /// Name of the module this instance runs.
    pub module_name: String,

    /// Logs collected from guest code.
    pub logs: Vec<LogEntry>,

    /// Call metrics.
    pub metrics: ExecutionMetrics,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// When the log was recorded.
    pub timestamp: Instant,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Counters for calls made into an instance after it was started.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Number of exported functions called.
    pub calls: u64,

    /// Fuel consumed across all calls (zero without fuel metering).
    pub fuel_consumed: u64,

    /// Duration of the most recent call.
    pub last_call: Option<Duration>,
}

impl InstanceContext {
    /// Create a context for one instance of `module_name`.
    ///
    /// The module name becomes `argv[0]`, followed by `wasi.args`.
    pub fn new(module_name: &str, wasi: &WasiConfig) -> Self {
        let mut builder = WasiCtxBuilder::new();
        builder.arg(module_name).args(wasi.args.as_slice());

        for (key, value) in &wasi.env {
            builder.env(key, value);
        }

        if wasi.inherit_stdio {
            builder.inherit_stdout().inherit_stderr();
        }

        Self {
            wasi: builder.build_p1(),
            instance_id: Uuid::new_v4().to_string(),
            module_name: module_name.to_string(),
            logs: Vec::new(),
            metrics: ExecutionMetrics::default(),
        }
    }

    /// Get the WASI context.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: String) {
        self.logs.push(LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        });
    }
}

/// Create a store for a new instance.
///
/// With fuel metering on, the store starts with the engine's `max_fuel`.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &WasmEngine,
    wasi: &WasiConfig,
    module_name: &str,
) -> Result<Store<InstanceContext>, RuntimeError> {
    let context = InstanceContext::new(module_name, wasi);
    let mut store = Store::new(engine.inner(), context);

    if engine.is_fuel_metered() {
        store
            .set_fuel(engine.config().max_fuel)
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))?;
    }

    Ok(store)
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<InstanceContext>) -> Option<u64> {
    store.get_fuel().ok()
}
