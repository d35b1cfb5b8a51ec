//! Entry-point resolution.

use tracing::debug;
use wasmtime::{Instance, Store};
use wasmtime_wasi::I32Exit;

use crate::store::InstanceContext;
use modrun_common::{EntryStage, RuntimeError};

/// Run the first entry export present on `instance`.
///
/// Stages are tried in [`EntryStage::ORDER`]. The first export that exists
/// with type `() -> ()` is called once and no later stage is looked up.
/// Returns the stage that ran, or `None` for modules with no entry export.
///
/// A WASI `proc_exit(0)` from the entry export counts as a normal return.
///
/// # Errors
///
/// Returns [`RuntimeError::EntryPoint`] if the chosen export traps or
/// exits with a non-zero code.
pub fn run_entry_point(
    store: &mut Store<InstanceContext>,
    instance: &Instance,
) -> Result<Option<EntryStage>, RuntimeError> {
    for stage in EntryStage::ORDER {
        let name = stage.export_name();

        let Some(func) = instance.get_func(&mut *store, name) else {
            continue;
        };

        let Ok(entry) = func.typed::<(), ()>(&*store) else {
            debug!(export = name, "Entry export has wrong signature, skipping");
            continue;
        };

        debug!(stage = %stage, "Running entry point");

        if let Err(e) = entry.call(&mut *store, ()) {
            match e.downcast_ref::<I32Exit>() {
                Some(I32Exit(0)) => debug!(stage = %stage, "Entry point exited with code 0"),
                Some(I32Exit(code)) => {
                    return Err(RuntimeError::entry_point(
                        stage,
                        format!("exited with code {code}"),
                    ));
                }
                None => return Err(RuntimeError::entry_point(stage, format!("{e:#}"))),
            }
        }

        return Ok(Some(stage));
    }

    debug!("No entry export, instance ready without startup");
    Ok(None)
}
