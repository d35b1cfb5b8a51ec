//! Started WebAssembly instances.
//!
//! A [`RuntimeInstance`] is what [`RuntimeBuilder::new_instance`] hands back:
//! the module is instantiated and its entry point (if any) has completed.
//! From here the caller drives it by calling exports.
//!
//! [`RuntimeBuilder::new_instance`]: crate::RuntimeBuilder::new_instance

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, instrument, warn};
use wasmtime::{Instance, Memory, Store, Trap, WasmParams, WasmResults};

use crate::CompiledModule;
use crate::store::{InstanceContext, get_remaining_fuel};
use modrun_common::{EntryStage, RuntimeError};

/// Result of calling a `() -> ()` export.
#[derive(Debug)]
pub enum ExecutionResult {
    /// The call returned normally.
    Success,

    /// The call trapped.
    Trap {
        /// Description of the trap.
        message: String,
        /// Trap code if available.
        code: Option<String>,
    },
}

impl ExecutionResult {
    /// Returns `true` if execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }

    /// Returns `true` if execution trapped.
    pub fn is_trap(&self) -> bool {
        matches!(self, ExecutionResult::Trap { .. })
    }
}

/// A live, started module instance.
///
/// Owns its store exclusively; the compiled module is shared with every
/// other instance from the same builder.
pub struct RuntimeInstance {
    store: Store<InstanceContext>,
    instance: Instance,
    module: Arc<CompiledModule>,
    entry_stage: Option<EntryStage>,
}

impl RuntimeInstance {
    pub(crate) fn new(
        store: Store<InstanceContext>,
        instance: Instance,
        module: Arc<CompiledModule>,
        entry_stage: Option<EntryStage>,
    ) -> Self {
        Self {
            store,
            instance,
            module,
            entry_stage,
        }
    }

    /// Unique instance identifier.
    pub fn id(&self) -> &str {
        &self.store.data().instance_id
    }

    /// The entry stage that ran during startup, if any.
    pub fn entry_stage(&self) -> Option<EntryStage> {
        self.entry_stage
    }

    /// The compiled module this instance was created from.
    pub fn module(&self) -> &Arc<CompiledModule> {
        &self.module
    }

    /// Per-instance state (logs, metrics).
    pub fn context(&self) -> &InstanceContext {
        self.store.data()
    }

    /// Mutable per-instance state.
    pub fn context_mut(&mut self) -> &mut InstanceContext {
        self.store.data_mut()
    }

    /// Remaining fuel, if fuel metering is on.
    pub fn remaining_fuel(&self) -> Option<u64> {
        get_remaining_fuel(&self.store)
    }

    /// The exported linear memory named `memory`, if any.
    pub fn memory(&mut self) -> Option<Memory> {
        self.instance.get_memory(&mut self.store, "memory")
    }

    /// Returns `true` if the instance exports `name`.
    pub fn has_export(&mut self, name: &str) -> bool {
        self.instance.get_export(&mut self.store, name).is_some()
    }

    /// Call a `() -> ()` export.
    ///
    /// Traps are reported as [`ExecutionResult::Trap`]; the instance stays
    /// usable afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The export is missing or has another signature
    /// - Fuel is exhausted
    #[instrument(skip(self), fields(instance_id = %self.id()))]
    pub fn call(&mut self, export: &str) -> Result<ExecutionResult, RuntimeError> {
        let func = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, export)
            .map_err(|_| RuntimeError::export_not_found(export))?;

        let start = Instant::now();
        let initial_fuel = self.remaining_fuel();

        let result = func.call(&mut self.store, ());
        self.record_call(start, initial_fuel);

        match result {
            Ok(()) => {
                debug!(
                    duration_us = start.elapsed().as_micros(),
                    "Call completed successfully"
                );
                Ok(ExecutionResult::Success)
            }
            Err(trap) => {
                if is_out_of_fuel(&trap) {
                    warn!("Call terminated: fuel exhausted");
                    return Err(RuntimeError::FuelExhausted);
                }

                let (message, code) = extract_trap_info(&trap);
                error!(trap_message = %message, "Call trapped");

                Ok(ExecutionResult::Trap { message, code })
            }
        }
    }

    /// Call an export with an arbitrary signature.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ExportNotFound`] if the export is missing or
    /// its type does not match `P -> R`, [`RuntimeError::FuelExhausted`] or
    /// [`RuntimeError::Trap`] if the call fails.
    pub fn call_typed<P, R>(&mut self, export: &str, params: P) -> Result<R, RuntimeError>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self
            .instance
            .get_typed_func::<P, R>(&mut self.store, export)
            .map_err(|_| RuntimeError::export_not_found(export))?;

        let start = Instant::now();
        let initial_fuel = self.remaining_fuel();

        let result = func.call(&mut self.store, params);
        self.record_call(start, initial_fuel);

        result.map_err(|trap| {
            if is_out_of_fuel(&trap) {
                RuntimeError::FuelExhausted
            } else {
                RuntimeError::trap(extract_trap_info(&trap).0)
            }
        })
    }

    fn record_call(&mut self, start: Instant, initial_fuel: Option<u64>) {
        let consumed = match (initial_fuel, self.remaining_fuel()) {
            (Some(before), Some(after)) => before.saturating_sub(after),
            _ => 0,
        };

        let metrics = &mut self.store.data_mut().metrics;
        metrics.calls += 1;
        metrics.fuel_consumed += consumed;
        metrics.last_call = Some(start.elapsed());
    }
}

impl std::fmt::Debug for RuntimeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeInstance")
            .field("id", &self.id())
            .field("module", &self.context().module_name)
            .field("entry_stage", &self.entry_stage)
            .finish_non_exhaustive()
    }
}

/// Extract human-readable trap information.
fn extract_trap_info(error: &wasmtime::Error) -> (String, Option<String>) {
    let message = format!("{error:#}");
    let code = error.downcast_ref::<Trap>().map(|trap| format!("{trap:?}"));

    (message, code)
}

/// Check if an error is due to fuel exhaustion.
fn is_out_of_fuel(error: &wasmtime::Error) -> bool {
    error
        .downcast_ref::<Trap>()
        .is_some_and(|trap| *trap == Trap::OutOfFuel)
}
