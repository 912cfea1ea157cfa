//! Command line entry point of the document migration.
//!
//! Loads the configuration, applies command line overrides, runs the pipeline and maps its outcome
//! to the process exit code: 0 when the source was drained, 1 on a fatal error and 130 when the
//! run was interrupted.

use std::process::ExitCode;

use clap::Parser;
use migrate::types::MigrationSummary;
use migrate_config::load_config;
use migrate_config::shared::MigratorConfig;
use migrate_telemetry::tracing::init_tracing;
use tracing::{error, info};

use crate::core::start_migration;

mod core;

/// Exit code of a run stopped by SIGINT or SIGTERM, as a shell reports a process killed by SIGINT.
const INTERRUPTED_EXIT_CODE: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "migrator", version, about = "Migrates documents into a relational table")]
struct Args {
    /// Transform and count rows without writing to the sink.
    #[arg(long)]
    dry_run: bool,

    /// Number of upsert workers, overriding `pipeline.worker_count`.
    #[arg(long)]
    workers: Option<usize>,

    /// Ignore and clear the stored checkpoint, starting from the beginning of the source.
    #[arg(long)]
    fresh: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_migrator_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_flusher = match init_tracing(env!("CARGO_BIN_NAME"), config.log_dir.as_deref()) {
        Ok(flusher) => flusher,
        Err(err) => {
            eprintln!("failed to initialize tracing: {err}");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(start_migration(config, args.fresh)) {
        Ok(summary) => ExitCode::from(exit_status(&summary)),
        Err(err) => {
            error!("migration failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Loads and validates the configuration with the command line overrides applied.
fn load_migrator_config(args: &Args) -> anyhow::Result<MigratorConfig> {
    let mut config = load_config::<MigratorConfig>()?;

    if args.dry_run {
        config.pipeline.dry_run = true;
    }
    if let Some(workers) = args.workers {
        config.pipeline.worker_count = workers;
    }

    config.validate()?;

    Ok(config)
}

fn exit_status(summary: &MigrationSummary) -> u8 {
    if summary.interrupted {
        info!(%summary, "migration interrupted, rerun to resume");
        INTERRUPTED_EXIT_CODE
    } else {
        info!(%summary, "migration finished");
        0
    }
}
