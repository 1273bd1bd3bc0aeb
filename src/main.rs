//! csvherd - Sharded SQL table to CSV exporter
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use csvherd::config::{CliArgs, ExportConfig};
use csvherd::export::ExportCoordinator;
use csvherd::progress::{print_header, print_summary, ExportProgress};
use csvherd::source::SqliteSource;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = ExportConfig::from_args(args).context("Invalid configuration")?;

    let source = Arc::new(SqliteSource::new(&config.database));
    let coordinator =
        ExportCoordinator::new(&config, source).context("Failed to prepare export")?;

    let job = coordinator.job();
    if config.show_progress {
        print_header(
            &job.table,
            job.total_rows,
            job.effective_shards(),
            &config.output_path.display().to_string(),
        );
    }

    let progress = if config.show_progress {
        Some(ExportProgress::new())
    } else {
        None
    };

    let result = coordinator.run(progress.as_ref()).context("Export failed")?;

    let output_size = std::fs::metadata(&config.output_path).map(|m| m.len()).ok();
    print_summary(
        result.rows_exported,
        result.shard_count,
        result.degraded,
        result.duration,
        &config.output_path.display().to_string(),
        output_size,
    );

    Ok(())
}

/// Configure tracing output. RUST_LOG overrides; -v enables debug events.
fn setup_logging(verbose: bool) -> Result<()> {
    let default_filter = if verbose { "csvherd=debug" } else { "csvherd=warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
