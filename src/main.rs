//! modrun CLI entry point.
//!
//! Loads one module, starts one or more instances of it and optionally
//! calls an export on each.

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modrun_common::ConfigFile;
use modrun_core::{ExecutionResult, ModuleSource, RuntimeBuilder, WasmEngine};
use modrun_host::{Capabilities, FileSource, directory_backend, host_functions};

/// Run a WebAssembly module with gated host capabilities.
#[derive(Debug, Parser)]
#[command(name = "modrun", version)]
struct Cli {
    /// Module to run: a `.wasm`/`.wat` path, or a module name from the config file.
    module: String,

    /// TOML configuration file.
    #[arg(short, long, env = "MODRUN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory served to `env::get_static_file`. Overrides `static_dir`.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Export to call on each instance after startup.
    #[arg(long)]
    call: Option<String>,

    /// Number of instances to create.
    #[arg(short = 'n', long, default_value_t = 1)]
    instances: usize,

    /// Emit logs as JSON lines.
    #[arg(long, env = "MODRUN_LOG_JSON")]
    log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,modrun=debug".into()),
        )
        .with(cli.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    let config = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigFile::default(),
    };

    let module_path = config
        .module(&cli.module)
        .map_or_else(|| PathBuf::from(&cli.module), |entry| PathBuf::from(&entry.path));

    let mut capabilities = Capabilities::from_config(&config.runtime.capabilities);
    let static_dir = cli
        .static_dir
        .clone()
        .or_else(|| config.static_dir.as_ref().map(PathBuf::from));
    if let Some(dir) = static_dir {
        info!(static_dir = %dir.display(), "Serving static files");
        capabilities = capabilities.with_file(
            FileSource::file(config.runtime.capabilities.file).with_backend(directory_backend(dir)),
        );
    }

    let engine = WasmEngine::new(&config.runtime.engine)?;
    let builder = RuntimeBuilder::new(engine, ModuleSource::from_file(&module_path))
        .with_host_functions(host_functions(&capabilities)?)
        .with_wasi(config.runtime.wasi.clone());

    info!(module = %module_path.display(), instances = cli.instances, "Starting");

    for _ in 0..cli.instances {
        let mut instance = builder
            .new_instance()
            .with_context(|| format!("Failed to start {}", module_path.display()))?;

        match instance.entry_stage() {
            Some(stage) => println!("{}: started via {stage}", instance.id()),
            None => println!("{}: no entry point", instance.id()),
        }

        if let Some(export) = &cli.call {
            match instance.call(export)? {
                ExecutionResult::Success => println!("{}: {export} returned", instance.id()),
                ExecutionResult::Trap { message, .. } => {
                    warn!(export = %export, "Call trapped");
                    bail!("{export} trapped: {message}");
                }
            }
        }

        for entry in &instance.context().logs {
            println!("{}: [{}] {}", instance.id(), entry.level, entry.message);
        }
    }

    let stats = builder.stats();
    info!(
        compilations = stats.compilations,
        instances_created = stats.instances_created,
        import_fallbacks = stats.import_fallbacks,
        "Done"
    );

    Ok(())
}
