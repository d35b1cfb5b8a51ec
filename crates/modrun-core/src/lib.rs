//! Embeddable WebAssembly runtime builder.
//!
//! This crate turns module bytes into ready-to-call instances:
//! - [`WasmEngine`]: Configured Wasmtime engine
//! - [`ModuleSource`]: Named, lazily loaded module bytes
//! - [`CompiledModule`]: Compiled module shared by every instance
//! - [`HostFunctionTable`]: Host functions bound into each instance's imports
//! - [`RuntimeBuilder`]: Compile-once, instantiate-many pipeline
//! - [`RuntimeInstance`]: A started instance
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    RuntimeBuilder                       │
//! │  (Shared across callers, thread-safe)                   │
//! │  - ModuleSource ──► CompiledModule   (compiled once)    │
//! │  - ImportEnvironment + HostFunctionTable ──► Linker     │
//! └─────────────────────────────────────────────────────────┘
//!                            │ new_instance()
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │   instantiate ──► _initialize | _start | init | none    │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │      RuntimeInstance = Store<InstanceContext> + Instance│
//! │  (Per caller, isolated)                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod engine;
pub mod entry;
pub mod imports;
pub mod instance;
pub mod module;
pub mod source;
pub mod store;

pub use builder::{BuilderStats, RuntimeBuilder};
pub use engine::WasmEngine;
pub use imports::{
    EmptyEnvironment, HostFn, HostFunctionTable, ImportEnvironment, WasiEnvironment,
};
pub use instance::{ExecutionResult, RuntimeInstance};
pub use module::CompiledModule;
pub use source::ModuleSource;
pub use store::{ExecutionMetrics, InstanceContext, LogEntry, LogLevel};
