//! Configuration structures for modrun.
//!
//! This module defines configuration options for various components:
//! - [`RuntimeConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (pooling, fuel)
//! - [`CapabilitiesConfig`]: Per-capability gates
//! - [`WasiConfig`]: WASI environment handed to each instance

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level runtime configuration.
///
/// It can be loaded from TOML (see [`crate::config_file`]) or JSON.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Capability gates.
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// WASI environment.
    #[serde(default)]
    pub wasi: WasiConfig,
}

/// Wasmtime engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Enable pooling allocator for fast instance creation.
    ///
    /// Memory for `max_instances` slots is reserved up front, so this is
    /// only worth it for builders that create many instances.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Maximum concurrent instances in the pool.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::max_instances")]
    pub max_instances: u32,

    /// Memory per instance slot in megabytes.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Enable fuel metering.
    ///
    /// Entry points have no timeout of their own; fuel is the only
    /// built-in bound on how long one can run.
    #[serde(default = "defaults::fuel_metering")]
    pub fuel_metering: bool,

    /// Fuel given to every new instance when metering is on.
    #[serde(default = "defaults::max_fuel")]
    pub max_fuel: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            max_instances: defaults::max_instances(),
            instance_memory_mb: defaults::instance_memory_mb(),
            fuel_metering: defaults::fuel_metering(),
            max_fuel: defaults::max_fuel(),
        }
    }
}

/// Configuration of a single capability.
///
/// `enabled` is the only recognized option. Capabilities are off unless
/// switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CapabilityConfig {
    /// Whether requests reach the backend at all.
    #[serde(default)]
    pub enabled: bool,
}

impl CapabilityConfig {
    /// An enabled capability.
    pub const fn enabled() -> Self {
        Self { enabled: true }
    }

    /// A disabled capability.
    pub const fn disabled() -> Self {
        Self { enabled: false }
    }
}

/// Gates for every capability kind the host provides.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CapabilitiesConfig {
    /// Static file access.
    #[serde(default)]
    pub file: CapabilityConfig,

    /// Guest logging.
    #[serde(default)]
    pub logging: CapabilityConfig,
}

/// WASI environment given to each instance.
///
/// The module name is always passed as `argv[0]`; `args` follow it.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WasiConfig {
    /// Inherit the host's stdout and stderr.
    #[serde(default)]
    pub inherit_stdio: bool,

    /// Extra command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Default value functions for serde.
mod defaults {
    pub const fn pooling_allocator() -> bool {
        false
    }

    pub const fn max_instances() -> u32 {
        1000
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub const fn fuel_metering() -> bool {
        false
    }

    pub const fn max_fuel() -> u64 {
        10_000_000
    }
}
