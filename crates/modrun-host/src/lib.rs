//! Capabilities and host functions for modrun.
//!
//! Guest modules reach privileged host facilities only through host
//! functions, and host functions reach them only through capability gates.
//!
//! # Capabilities
//!
//! - [`file`]: Static file reads through an embedder-supplied backend
//! - [`logging`]: Guest log lines forwarded to `tracing`
//!
//! # Security Model
//!
//! 1. **Closed by default**: A capability with `enabled = false` answers
//!    every request with [`CapabilityError::NotEnabled`] and never touches
//!    its backend.
//! 2. **No implicit backend**: An enabled capability without a backend
//!    answers [`CapabilityError::BackendUnset`].
//! 3. **Transparent backends**: Backend results and errors reach the
//!    caller unchanged.
//!
//! [`CapabilityError::NotEnabled`]: modrun_common::CapabilityError::NotEnabled
//! [`CapabilityError::BackendUnset`]: modrun_common::CapabilityError::BackendUnset

pub mod capability;
pub mod file;
pub mod linker;
pub mod logging;

pub use capability::{Capabilities, Gate};
pub use file::{FileCapability, FileSource, StaticFileFn, directory_backend};
pub use linker::{host_functions, register_all};
pub use logging::{LogCapability, LogSource, LoggingHost};
