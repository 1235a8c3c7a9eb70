//! Overseer - Telemetry data-processing supervisor
//!
//! # Usage
//!
//! ```bash
//! # Run the supervisor named RTA1 from a shared configuration file
//! overseer configs/pipeline.toml RTA1
//!
//! # With a different log level
//! overseer configs/pipeline.toml RTA1 --log-level debug
//! ```
//!
//! Exit code is 0 only when the supervisor reached `Shutdown` cleanly;
//! any startup failure exits non-zero with the reason logged.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use overseer_config::Config;
use overseer_core::Supervisor;

/// Overseer - Telemetry data-processing supervisor
#[derive(Parser, Debug)]
#[command(name = "overseer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    config: PathBuf,

    /// Which [supervisors.<name>] section to run
    name: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_file(&cli.config).context("failed to load configuration")?;
    let section = config
        .supervisor(&cli.name)
        .context("supervisor not found in configuration")?
        .clone();

    // Keep the guard alive for the whole run; dropping it flushes the
    // log file writer.
    let _guard = init_logging(&section.logs_path, &cli.name, &cli.log_level)?;

    let supervisor =
        Supervisor::new(section, &cli.name).context("failed to construct supervisor")?;

    supervisor.run().await.context("supervisor failed")?;
    Ok(())
}

/// Initialize logging to stdout and the per-supervisor log file
///
/// The file lands at `<logs_path>/Supervisor-<name>.log`, written
/// through a non-blocking appender.
fn init_logging(logs_path: &str, name: &str, level: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(logs_path)
        .with_context(|| format!("failed to create logs directory '{logs_path}'"))?;

    let file_appender =
        tracing_appender::rolling::never(logs_path, format!("Supervisor-{name}.log"));
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_target(true)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
