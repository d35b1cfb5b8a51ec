//! Logging capability.
//!
//! Guest log lines pass through a [`LogCapability`]. When it accepts a
//! line, the line is:
//! 1. Handed to the capability's sink (`tracing` by default)
//! 2. Stored in the [`InstanceContext`] for later retrieval

use std::sync::Arc;

use modrun_common::{CapabilityConfig, CapabilityError};
use modrun_core::store::{InstanceContext, LogLevel};
use tracing::{debug, error, info, warn};

use crate::capability::Gate;

/// Sink for accepted log lines: instance id, level, message.
pub type LogSink = dyn Fn(&str, LogLevel, &str) + Send + Sync;

/// Permission to emit guest logs.
pub trait LogCapability: Send + Sync {
    /// Emit one line on behalf of `instance_id`.
    fn log(&self, instance_id: &str, level: LogLevel, message: &str)
    -> Result<(), CapabilityError>;
}

/// The default logging capability: a [`Gate`] over a [`LogSink`].
pub type LogSource = Gate<LogSink>;

impl Gate<LogSink> {
    /// A logging gate that forwards to `tracing`.
    pub fn logging(config: CapabilityConfig) -> Self {
        Self::new("logging", config).with_backend(tracing_sink())
    }
}

impl LogCapability for Gate<LogSink> {
    fn log(
        &self,
        instance_id: &str,
        level: LogLevel,
        message: &str,
    ) -> Result<(), CapabilityError> {
        let sink = self.backend()?;
        sink(instance_id, level, message);
        Ok(())
    }
}

/// A sink that emits guest lines as `tracing` events.
pub fn tracing_sink() -> Arc<LogSink> {
    Arc::new(|instance_id: &str, level: LogLevel, message: &str| match level {
        LogLevel::Debug => debug!(instance_id, guest_log = true, "{}", message),
        LogLevel::Info => info!(instance_id, guest_log = true, "{}", message),
        LogLevel::Warn => warn!(instance_id, guest_log = true, "{}", message),
        LogLevel::Error => error!(instance_id, guest_log = true, "{}", message),
    })
}

/// Host side of the guest logging interface.
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    ///
    /// The line is stored in `ctx` only if `capability` accepts it.
    pub fn log(
        ctx: &mut InstanceContext,
        capability: &dyn LogCapability,
        level: LogLevel,
        message: &str,
    ) -> Result<(), CapabilityError> {
        capability.log(&ctx.instance_id, level, message)?;
        ctx.log(level, message.to_string());
        Ok(())
    }
}

/// Convert a numeric log level to [`LogLevel`].
///
/// 0=debug, 1=info, 2=warn, 3=error; unknown values map to info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}
