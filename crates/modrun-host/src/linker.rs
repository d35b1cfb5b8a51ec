//! Host function descriptors for the `env` import module.
//!
//! This module turns [`Capabilities`] into [`HostFn`] entries of a
//! [`HostFunctionTable`], so guest imports by these names resolve to the
//! gated host implementations.

use std::sync::Arc;

use modrun_common::{CapabilityError, RuntimeError};
use modrun_core::imports::arg_i32;
use modrun_core::store::InstanceContext;
use modrun_core::{HostFn, HostFunctionTable};
use tracing::{debug, warn};
use wasmtime::{Caller, Memory, Val, ValType};

use crate::capability::Capabilities;
use crate::file::FileCapability;
use crate::logging::{LogCapability, LoggingHost, level_from_i32};

/// Status codes returned to the guest by `env::get_static_file`.
pub mod status {
    /// The file capability is disabled.
    pub const NOT_ENABLED: i32 = -1;
    /// The file capability has no backend.
    pub const BACKEND_UNSET: i32 = -2;
    /// The backend failed.
    pub const BACKEND_ERROR: i32 = -3;
    /// Pointer/length arguments do not describe valid guest memory.
    pub const INVALID_ARGS: i32 = -4;
    /// The output buffer cannot hold the file.
    pub const BUFFER_TOO_SMALL: i32 = -5;
}

/// Register all standard host functions.
///
/// This registers:
/// - `env::log` - Logging through the logging capability
/// - `env::get_static_file` - Static file reads through the file capability
///
/// # Errors
///
/// Returns an error if a name is already registered in `table`.
pub fn register_all(table: &mut HostFunctionTable, caps: &Capabilities) -> Result<(), RuntimeError> {
    register_logging(table, Arc::clone(&caps.logging))?;
    register_static_file(table, Arc::clone(&caps.file))?;
    Ok(())
}

/// A table holding every standard host function.
pub fn host_functions(caps: &Capabilities) -> Result<HostFunctionTable, RuntimeError> {
    let mut table = HostFunctionTable::new();
    register_all(&mut table, caps)?;
    Ok(table)
}

/// Register the logging host function.
///
/// Registers `env::log(level: i32, ptr: i32, len: i32)` which allows guest
/// code to emit logs at various levels.
///
/// # Memory Protocol
///
/// The guest passes:
/// - `level`: Log level (0=debug, 1=info, 2=warn, 3=error)
/// - `ptr`: Pointer to the message string in guest memory
/// - `len`: Length of the message in bytes (UTF-8)
///
/// Lines refused by the capability and malformed arguments are dropped.
pub fn register_logging(
    table: &mut HostFunctionTable,
    logging: Arc<dyn LogCapability>,
) -> Result<(), RuntimeError> {
    table.insert(HostFn::new(
        "log",
        &[ValType::I32, ValType::I32, ValType::I32],
        &[],
        move |mut caller, params, _results| {
            let level = arg_i32(params, 0)?;
            let ptr = arg_i32(params, 1)?;
            let len = arg_i32(params, 2)?;

            let Some(bytes) = read_guest_bytes(&mut caller, ptr, len) else {
                return Ok(());
            };
            let message = String::from_utf8_lossy(&bytes);

            if let Err(e) =
                LoggingHost::log(caller.data_mut(), logging.as_ref(), level_from_i32(level), &message)
            {
                debug!(error = %e, "Guest log line dropped");
            }

            Ok(())
        },
    ))
}

/// Register the static file host function.
///
/// Registers `env::get_static_file(name_ptr, name_len, out_ptr, out_cap) -> i32`.
/// The file named by the UTF-8 string at `name_ptr` is copied to
/// `out_ptr`. Returns the number of bytes written or a negative
/// [`status`] code.
pub fn register_static_file(
    table: &mut HostFunctionTable,
    file: Arc<dyn FileCapability>,
) -> Result<(), RuntimeError> {
    table.insert(HostFn::new(
        "get_static_file",
        &[ValType::I32, ValType::I32, ValType::I32, ValType::I32],
        &[ValType::I32],
        move |mut caller, params, results| {
            let name_ptr = arg_i32(params, 0)?;
            let name_len = arg_i32(params, 1)?;
            let out_ptr = arg_i32(params, 2)?;
            let out_cap = arg_i32(params, 3)?;

            let code = get_static_file(
                &mut caller,
                file.as_ref(),
                (name_ptr, name_len),
                (out_ptr, out_cap),
            );
            results[0] = Val::I32(code);
            Ok(())
        },
    ))
}

fn get_static_file(
    caller: &mut Caller<'_, InstanceContext>,
    file: &dyn FileCapability,
    (name_ptr, name_len): (i32, i32),
    (out_ptr, out_cap): (i32, i32),
) -> i32 {
    let Some(name) = read_guest_bytes(caller, name_ptr, name_len) else {
        return status::INVALID_ARGS;
    };
    let Ok(name) = String::from_utf8(name) else {
        warn!("Static file name is not valid UTF-8");
        return status::INVALID_ARGS;
    };

    let contents = match file.get_static(&name) {
        Ok(contents) => contents,
        Err(e) => {
            debug!(file = %name, error = %e, "Static file request refused");
            return status_for(&e);
        }
    };

    let (Ok(out_offset), Ok(out_cap)) = (usize::try_from(out_ptr), usize::try_from(out_cap)) else {
        return status::INVALID_ARGS;
    };
    if contents.len() > out_cap {
        return status::BUFFER_TOO_SMALL;
    }
    let Ok(written) = i32::try_from(contents.len()) else {
        return status::BUFFER_TOO_SMALL;
    };

    let Some(memory) = guest_memory(caller) else {
        return status::INVALID_ARGS;
    };
    if memory.write(&mut *caller, out_offset, &contents).is_err() {
        warn!(offset = out_offset, len = contents.len(), "Memory access out of bounds");
        return status::INVALID_ARGS;
    }

    written
}

fn status_for(err: &CapabilityError) -> i32 {
    match err {
        CapabilityError::NotEnabled { .. } => status::NOT_ENABLED,
        CapabilityError::BackendUnset { .. } => status::BACKEND_UNSET,
        CapabilityError::Backend(_) => status::BACKEND_ERROR,
    }
}

fn guest_memory(caller: &mut Caller<'_, InstanceContext>) -> Option<Memory> {
    let memory = caller
        .get_export("memory")
        .and_then(wasmtime::Extern::into_memory);

    if memory.is_none() {
        warn!("Memory export not found in guest module");
    }
    memory
}

/// Copy `len` bytes at `ptr` out of guest memory.
///
/// The range is checked against the memory size before anything is copied.
fn read_guest_bytes(caller: &mut Caller<'_, InstanceContext>, ptr: i32, len: i32) -> Option<Vec<u8>> {
    let (Ok(start), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
        warn!(ptr = ptr, len = len, "Invalid pointer or length (negative value)");
        return None;
    };

    let memory = guest_memory(caller)?;
    let data = memory.data(&*caller);

    let Some(bytes) = start.checked_add(len).and_then(|end| data.get(start..end)) else {
        warn!(
            start = start,
            len = len,
            memory_size = data.len(),
            "Memory access out of bounds"
        );
        return None;
    };

    Some(bytes.to_vec())
}
