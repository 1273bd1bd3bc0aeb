//! Shard exporter - one thread per partition
//!
//! Each exporter:
//! - Opens its own cursor over the partition's offset range (or the whole
//!   table in degraded mode)
//! - Submits the column list to the sink's header path; the sink decides
//!   whether that submission wins
//! - Streams rows to the sink, converting NULL columns to empty strings
//! - Bumps its progress counter after every row
//!
//! On a fetch or sink error the exporter stops early and returns the error
//! upward. No retries, no rewinding of already-written records.

use crate::error::{ExportError, WorkerError};
use crate::export::plan::Partition;
use crate::progress::ShardBar;
use crate::sink::SinkHandle;
use crate::source::TableSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Per-shard progress counters. Written only by the owning exporter,
/// read by the progress path.
#[derive(Debug)]
pub struct ShardStats {
    /// Rows pushed through the sink so far
    rows_processed: AtomicU64,

    /// Rows this shard is expected to produce
    rows_total: u64,
}

impl ShardStats {
    fn new(rows_total: u64) -> Self {
        Self {
            rows_processed: AtomicU64::new(0),
            rows_total,
        }
    }

    pub fn rows_processed(&self) -> u64 {
        self.rows_processed.load(Ordering::Relaxed)
    }

    pub fn rows_total(&self) -> u64 {
        self.rows_total
    }
}

/// A shard exporter thread and its join handle
pub struct ShardExporter {
    index: usize,
    handle: Option<JoinHandle<Result<(), ExportError>>>,
    stats: Arc<ShardStats>,
}

impl ShardExporter {
    /// Spawn an exporter for `range`.
    ///
    /// `range` is `None` in degraded single-shard mode, where the cursor
    /// covers the whole table with no offset/limit applied.
    pub fn spawn(
        index: usize,
        table: String,
        range: Option<Partition>,
        rows_total: u64,
        source: Arc<dyn TableSource>,
        sink: SinkHandle,
        bar: Option<ShardBar>,
    ) -> Result<Self, WorkerError> {
        let stats = Arc::new(ShardStats::new(rows_total));
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("shard-{}", index))
            .spawn(move || shard_loop(index, table, range, source, sink, bar, stats_clone))
            .map_err(|e| WorkerError::SpawnFailed {
                index,
                reason: e.to_string(),
            })?;

        Ok(Self {
            index,
            handle: Some(handle),
            stats,
        })
    }

    /// Shard index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Progress counters for this shard
    pub fn stats(&self) -> &Arc<ShardStats> {
        &self.stats
    }

    /// Wait for the shard to reach its terminal state
    pub fn join(mut self) -> Result<(), ExportError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Panicked { index: self.index }.into()),
            },
            None => Ok(()),
        }
    }
}

/// Main shard loop: cursor -> records -> sink
fn shard_loop(
    index: usize,
    table: String,
    range: Option<Partition>,
    source: Arc<dyn TableSource>,
    sink: SinkHandle,
    bar: Option<ShardBar>,
    stats: Arc<ShardStats>,
) -> Result<(), ExportError> {
    match &range {
        Some(p) => debug!(shard = index, low = p.low, high = p.high, "Shard starting"),
        None => debug!(shard = index, "Shard starting (full table, degraded mode)"),
    }

    let mut cursor = source.open(&table, range.as_ref()).map_err(|e| {
        warn!(shard = index, error = %e, "Failed to open cursor");
        e
    })?;

    // The sink keeps the header idempotent; whether this submission wins
    // is invisible here, and deliberately so.
    sink.write_header(cursor.columns().to_vec())?;

    let mut rows: u64 = 0;
    while let Some(raw) = cursor.next_row()? {
        let record: Vec<String> = raw.into_iter().map(field_text).collect();
        sink.write_record(record)?;

        rows += 1;
        stats.rows_processed.fetch_add(1, Ordering::Relaxed);
        if let Some(ref bar) = bar {
            bar.row_processed();
        }
    }

    if let Some(ref bar) = bar {
        bar.finish();
    }

    info!(shard = index, rows = rows, "Shard finished");
    Ok(())
}

/// Encode one raw column value as a CSV field.
///
/// NULL becomes the empty string - indistinguishable from an actual empty
/// string, which is an accepted ambiguity of the output format.
fn field_text(value: Option<Vec<u8>>) -> String {
    match value {
        None => String::new(),
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
    }
}
