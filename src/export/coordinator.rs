//! Export coordinator - orchestrates the sharded export
//!
//! The coordinator:
//! - Reads the source's capability descriptor
//! - Captures the row count once, before planning (never re-validated)
//! - Degrades to a single unrestricted shard when range pagination is
//!   unsupported
//! - Builds the partition plan and the shared output sink
//! - Fans out one shard exporter per partition and waits for all of them
//!   to reach a terminal state - the first error is recorded but siblings
//!   are never cancelled
//! - Flushes and closes the sink exactly once, in every outcome

use crate::config::ExportConfig;
use crate::error::{ConfigError, ExportError, Result};
use crate::export::plan::{self, clamp_shard_count, Partition};
use crate::export::worker::ShardExporter;
use crate::progress::ExportProgress;
use crate::sink::{CsvSink, SinkOptions};
use crate::source::TableSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Immutable configuration for one export run.
///
/// Created once at startup from the validated config plus the capability
/// probe and the one-time count query; read-only afterward.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Table to export
    pub table: String,

    /// Row count captured once before partitioning. Shard boundaries are
    /// computed from this snapshot; a table mutating mid-export is outside
    /// this design's guarantees.
    pub total_rows: u64,

    /// Shard count as requested on the command line
    pub requested_shards: usize,

    /// Output artifact path
    pub output_path: PathBuf,

    /// Emit the column header as the first line
    pub with_header: bool,

    /// Sink flush cadence, in records
    pub flush_every: u64,

    /// Capability flag from the probe
    pub supports_range_pagination: bool,
}

impl ExportJob {
    /// Shard count the run will actually use: clamped to the row count,
    /// and forced to 1 when the source cannot paginate ranges.
    pub fn effective_shards(&self) -> usize {
        if self.supports_range_pagination {
            clamp_shard_count(self.requested_shards, self.total_rows)
        } else {
            1
        }
    }

    /// Whether this run is in the degraded single-shard mode
    pub fn degraded(&self) -> bool {
        !self.supports_range_pagination
    }
}

/// Result of a completed export
#[derive(Debug)]
pub struct ExportResult {
    /// Rows present when the job started
    pub total_rows: u64,

    /// Rows actually written to the artifact
    pub rows_exported: u64,

    /// Number of shards used
    pub shard_count: usize,

    /// Whether the run degraded to single-shard mode
    pub degraded: bool,

    /// Wall-clock time for the export
    pub duration: Duration,
}

/// Coordinates the sharded export of one table
pub struct ExportCoordinator {
    job: ExportJob,
    source: Arc<dyn TableSource>,
}

impl ExportCoordinator {
    /// Probe the source, capture the row count and build the immutable job.
    ///
    /// Fails before any artifact write for an empty table, so a zero-row
    /// job never creates or touches the output file.
    pub fn new(config: &ExportConfig, source: Arc<dyn TableSource>) -> Result<Self> {
        let capabilities = source.capabilities()?;
        let total_rows = source.count_rows(&config.table)?;

        if total_rows == 0 {
            return Err(ConfigError::NoRows {
                table: config.table.clone(),
            }
            .into());
        }

        if !capabilities.supports_range_pagination {
            warn!(
                table = %config.table,
                "Source cannot paginate ranges; forcing single-shard export"
            );
        }

        let job = ExportJob {
            table: config.table.clone(),
            total_rows,
            requested_shards: config.shards,
            output_path: config.output_path.clone(),
            with_header: config.with_header,
            flush_every: config.flush_every,
            supports_range_pagination: capabilities.supports_range_pagination,
        };

        Ok(Self { job, source })
    }

    /// The immutable job this coordinator will run
    pub fn job(&self) -> &ExportJob {
        &self.job
    }

    /// Run the export to completion.
    ///
    /// Returns the first shard error (or the sink's own error, which takes
    /// precedence as the shared root cause) after every shard has reached a
    /// terminal state. Partial output is left in place on failure.
    pub fn run(self, progress: Option<&ExportProgress>) -> Result<ExportResult> {
        let start = Instant::now();
        let job = &self.job;

        let shards = job.effective_shards();
        let ranges: Vec<Option<Partition>> = if job.degraded() {
            // Single unrestricted cursor; no offset/limit applied
            vec![None]
        } else {
            plan::plan(job.total_rows, shards)
                .into_iter()
                .map(Some)
                .collect()
        };

        info!(
            table = %job.table,
            rows = job.total_rows,
            shards = ranges.len(),
            degraded = job.degraded(),
            "Starting export"
        );

        let sink = CsvSink::create(
            &job.output_path,
            SinkOptions {
                with_header: job.with_header,
                flush_every: job.flush_every,
            },
        )?;

        let mut exporters = Vec::with_capacity(ranges.len());
        let mut spawn_error: Option<ExportError> = None;
        for (index, range) in ranges.into_iter().enumerate() {
            let rows_total = range.as_ref().map_or(job.total_rows, |p| p.len());
            let bar = progress.map(|p| {
                let label = range
                    .as_ref()
                    .map_or_else(|| "shard-0".to_string(), Partition::label);
                p.add_shard(&label, rows_total)
            });

            match ShardExporter::spawn(
                index,
                job.table.clone(),
                range,
                rows_total,
                Arc::clone(&self.source),
                sink.handle(),
                bar,
            ) {
                Ok(exporter) => exporters.push(exporter),
                Err(e) => {
                    // Already-running shards are left to finish on their own
                    spawn_error = Some(e.into());
                    break;
                }
            }
        }

        // Wait for every shard to reach a terminal state. The first error
        // wins the report; siblings keep running regardless.
        let mut first_error = spawn_error;
        let mut rows_exported: u64 = 0;
        for exporter in exporters {
            let index = exporter.index();
            let stats = Arc::clone(exporter.stats());
            match exporter.join() {
                Ok(()) => rows_exported += stats.rows_processed(),
                Err(e) => {
                    warn!(shard = index, error = %e, "Shard failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        debug!(rows = rows_exported, "All shards reached a terminal state");

        // Close the sink exactly once, whatever happened above. A sink
        // error outranks shard errors: the shared artifact is the root
        // cause of any secondary channel-closed failures.
        let sink_result = sink.finish();

        let duration = start.elapsed();
        match (sink_result, first_error) {
            (Err(e), _) => Err(e.into()),
            (Ok(_), Some(e)) => Err(e),
            (Ok(records), None) => {
                info!(
                    rows = records,
                    duration_secs = duration.as_secs(),
                    "Export completed"
                );
                Ok(ExportResult {
                    total_rows: job.total_rows,
                    rows_exported: records,
                    shard_count: shards,
                    degraded: job.degraded(),
                    duration,
                })
            }
        }
    }
}
