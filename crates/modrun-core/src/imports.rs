//! Import sets: the generated environment plus named host functions.
//!
//! An instance's imports come from two places:
//!
//! 1. An [`ImportEnvironment`] that fills a fresh linker (WASI preview 1
//!    by default). If it fails, the builder falls back to an empty linker.
//! 2. A [`HostFunctionTable`], an explicit map from `(module, name)` to a
//!    host implementation, bound on top of the environment.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use wasmtime::{Caller, FuncType, Linker, Val, ValType};

use crate::store::InstanceContext;
use modrun_common::RuntimeError;

/// Import module used when a host function does not name one.
pub const DEFAULT_IMPORT_MODULE: &str = "env";

/// Generates the base import set for a builder.
pub trait ImportEnvironment: Send + Sync {
    /// Add this environment's definitions to `linker`.
    ///
    /// An error here is an import-generation failure; the builder recovers
    /// by discarding `linker` and continuing with no environment imports.
    fn generate(&self, linker: &mut Linker<InstanceContext>) -> Result<(), RuntimeError>;
}

/// WASI preview 1 (`wasi_snapshot_preview1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WasiEnvironment;

impl ImportEnvironment for WasiEnvironment {
    fn generate(&self, linker: &mut Linker<InstanceContext>) -> Result<(), RuntimeError> {
        wasmtime_wasi::preview1::add_to_linker_sync(linker, |ctx: &mut InstanceContext| {
            ctx.wasi_mut()
        })
        .map_err(|e| RuntimeError::import_generation(format!("WASI preview 1: {e}")))
    }
}

/// No environment imports; only host functions are visible to the guest.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl ImportEnvironment for EmptyEnvironment {
    fn generate(&self, _linker: &mut Linker<InstanceContext>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Implementation of a host function with a dynamic signature.
pub type HostFnImpl = dyn Fn(Caller<'_, InstanceContext>, &[Val], &mut [Val]) -> wasmtime::Result<()>
    + Send
    + Sync
    + 'static;

/// Descriptor for one host function: import name, signature, implementation.
///
/// The implementation usually closes over a capability gate. Wasmtime
/// checks the guest's import type against `params`/`results` at
/// instantiation, so implementations may rely on argument types.
#[derive(Clone)]
pub struct HostFn {
    module: String,
    name: String,
    params: Vec<ValType>,
    results: Vec<ValType>,
    func: Arc<HostFnImpl>,
}

impl HostFn {
    /// Describe a host function imported from `env`.
    pub fn new<F>(
        name: impl Into<String>,
        params: &[ValType],
        results: &[ValType],
        func: F,
    ) -> Self
    where
        F: Fn(Caller<'_, InstanceContext>, &[Val], &mut [Val]) -> wasmtime::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self {
            module: DEFAULT_IMPORT_MODULE.to_string(),
            name: name.into(),
            params: params.to_vec(),
            results: results.to_vec(),
            func: Arc::new(func),
        }
    }

    /// Import this function from `module` instead of `env`.
    #[must_use]
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Import module name.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Import field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn define(&self, linker: &mut Linker<InstanceContext>) -> Result<(), RuntimeError> {
        let ty = FuncType::new(
            linker.engine(),
            self.params.iter().cloned(),
            self.results.iter().cloned(),
        );
        let func = Arc::clone(&self.func);

        linker
            .func_new(&self.module, &self.name, ty, move |caller, params, results| {
                func(caller, params, results)
            })
            .map_err(|e| RuntimeError::Binding {
                module: self.module.clone(),
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(())
    }
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFn")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("params", &self.params.len())
            .field("results", &self.results.len())
            .finish_non_exhaustive()
    }
}

/// Host functions keyed by import name.
///
/// Names are unique; order does not matter.
#[derive(Clone, Default)]
pub struct HostFunctionTable {
    fns: BTreeMap<(String, String), HostFn>,
}

impl HostFunctionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host function.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateHostFunction`] if the import name is
    /// already taken. The table is left unchanged.
    pub fn insert(&mut self, host_fn: HostFn) -> Result<(), RuntimeError> {
        let key = (host_fn.module.clone(), host_fn.name.clone());

        if self.fns.contains_key(&key) {
            return Err(RuntimeError::DuplicateHostFunction {
                module: key.0,
                name: key.1,
            });
        }

        self.fns.insert(key, host_fn);
        Ok(())
    }

    /// Returns `true` if `module::name` is registered.
    pub fn contains(&self, module: &str, name: &str) -> bool {
        self.fns.contains_key(&(module.to_string(), name.to_string()))
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.fns.len()
    }

    /// Returns `true` if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    /// Registered import names as `(module, name)`.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fns.keys().map(|(m, n)| (m.as_str(), n.as_str()))
    }

    /// Define every function on `linker`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Binding`] if a name is already defined on
    /// the linker, e.g. by the import environment.
    pub fn bind(&self, linker: &mut Linker<InstanceContext>) -> Result<(), RuntimeError> {
        for host_fn in self.fns.values() {
            host_fn.define(linker)?;
        }
        Ok(())
    }
}

impl fmt::Debug for HostFunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fns.values()).finish()
    }
}

/// Read an `i32` argument.
///
/// # Errors
///
/// Fails if the argument is missing or not an `i32`.
pub fn arg_i32(params: &[Val], index: usize) -> wasmtime::Result<i32> {
    params
        .get(index)
        .and_then(Val::i32)
        .ok_or_else(|| wasmtime::Error::msg(format!("expected i32 argument at position {index}")))
}
