//! Serialized CSV sink shared by all shard exporters
//!
//! A single dedicated writer thread owns the output file and drains a
//! bounded channel of whole records. That thread is the only code that ever
//! touches the artifact, which gives the two guarantees the engine needs
//! with no locking in the hot path:
//!
//! - the header is written exactly once, no matter how many shards race to
//!   submit it
//! - one record is written atomically relative to all other producers; no
//!   interleaved or truncated lines can appear in the file
//!
//! Records are buffered and flushed every `flush_every` records (default
//! 1000) and unconditionally at shutdown. Any write or flush error kills
//! the writer thread; producers then see a closed channel and the real
//! error surfaces from [`CsvSink::finish`].

use crate::error::SinkError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

/// Default flush cadence, in records
pub const DEFAULT_FLUSH_EVERY: u64 = 1000;

/// Channel capacity between producers and the writer thread
const SINK_CHANNEL_SIZE: usize = 4096;

/// Sink configuration
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Emit the column-name header as the first line
    pub with_header: bool,

    /// Flush the artifact every N records
    pub flush_every: u64,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            with_header: true,
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

/// Messages sent to the writer thread
#[derive(Debug)]
enum SinkMessage {
    /// Column names; written once, every later submission is a no-op
    Header(Vec<String>),

    /// One full record
    Record(Vec<String>),

    /// Flush pending bytes now
    Flush,

    /// Final flush, then stop
    Shutdown,
}

/// Counters published by the writer thread
#[derive(Debug, Default)]
pub struct SinkStats {
    /// Data records written (header excluded)
    records_written: AtomicU64,

    /// Flushes performed
    flushes: AtomicU64,
}

impl SinkStats {
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }
}

/// Cloneable producer handle; one per shard exporter
#[derive(Clone)]
pub struct SinkHandle {
    sender: Sender<SinkMessage>,
    stats: Arc<SinkStats>,
}

impl SinkHandle {
    /// Submit the header. First submission wins; the rest are silently
    /// skipped by the writer thread. Callers never learn which they were.
    pub fn write_header(&self, columns: Vec<String>) -> Result<(), SinkError> {
        self.sender
            .send(SinkMessage::Header(columns))
            .map_err(|_| SinkError::ChannelClosed)
    }

    /// Submit one full record
    pub fn write_record(&self, record: Vec<String>) -> Result<(), SinkError> {
        self.sender
            .send(SinkMessage::Record(record))
            .map_err(|_| SinkError::ChannelClosed)
    }

    /// Request an out-of-cadence flush
    pub fn flush(&self) -> Result<(), SinkError> {
        self.sender
            .send(SinkMessage::Flush)
            .map_err(|_| SinkError::ChannelClosed)
    }

    /// Writer-thread counters
    pub fn stats(&self) -> &SinkStats {
        &self.stats
    }
}

/// CSV sink bound to one output file, with a dedicated writer thread
pub struct CsvSink {
    handle: Option<JoinHandle<Result<(), SinkError>>>,
    sink_handle: SinkHandle,
    path: PathBuf,
}

impl CsvSink {
    /// Create the output file and spawn the writer thread.
    ///
    /// The file is created with truncation so a rerun never interleaves
    /// with stale bytes from a previous attempt.
    pub fn create(path: &Path, options: SinkOptions) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        let writer = csv::Writer::from_writer(BufWriter::new(file));

        let (sender, receiver) = bounded(SINK_CHANNEL_SIZE);
        let stats = Arc::new(SinkStats::default());

        let sink_handle = SinkHandle {
            sender,
            stats: Arc::clone(&stats),
        };

        let thread_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("csv-sink".into())
            .spawn(move || sink_thread(writer, receiver, thread_stats, options))
            .map_err(|e| {
                SinkError::Io(std::io::Error::other(format!(
                    "Failed to spawn sink thread: {}",
                    e
                )))
            })?;

        debug!(path = %path.display(), "Output sink created");

        Ok(Self {
            handle: Some(handle),
            sink_handle,
            path: path.to_path_buf(),
        })
    }

    /// Get a producer handle for a shard exporter
    pub fn handle(&self) -> SinkHandle {
        self.sink_handle.clone()
    }

    /// Path of the output artifact
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, close and join the writer thread. Must be called exactly once,
    /// after every producer has finished; returns the writer's fatal error
    /// if it died mid-job.
    pub fn finish(mut self) -> Result<u64, SinkError> {
        // A full or closed channel is fine here - if the writer already
        // died, join reports the real error below.
        let _ = self.sink_handle.sender.send(SinkMessage::Shutdown);

        let records = match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => {
                    result?;
                    self.sink_handle.stats.records_written()
                }
                Err(_) => return Err(SinkError::Panicked),
            },
            None => self.sink_handle.stats.records_written(),
        };

        info!(path = %self.path.display(), records = records, "Output sink closed");
        Ok(records)
    }
}

/// Writer thread: the only owner of the artifact handle and the header flag
fn sink_thread(
    mut writer: csv::Writer<BufWriter<File>>,
    receiver: Receiver<SinkMessage>,
    stats: Arc<SinkStats>,
    options: SinkOptions,
) -> Result<(), SinkError> {
    let mut header_written = false;
    let mut unflushed: u64 = 0;

    while let Ok(msg) = receiver.recv() {
        match msg {
            SinkMessage::Header(columns) => {
                if header_written {
                    continue;
                }
                // First submission wins. With the header disabled the flag
                // is still set, so racing submissions degrade identically.
                if options.with_header {
                    writer.write_record(&columns)?;
                    writer.flush()?;
                    stats.flushes.fetch_add(1, Ordering::Relaxed);
                }
                header_written = true;
            }
            SinkMessage::Record(record) => {
                writer.write_record(&record)?;
                stats.records_written.fetch_add(1, Ordering::Relaxed);
                unflushed += 1;
                if unflushed >= options.flush_every {
                    writer.flush()?;
                    stats.flushes.fetch_add(1, Ordering::Relaxed);
                    unflushed = 0;
                }
            }
            SinkMessage::Flush => {
                writer.flush()?;
                stats.flushes.fetch_add(1, Ordering::Relaxed);
                unflushed = 0;
            }
            SinkMessage::Shutdown => break,
        }
    }

    // Final flush, also reached if every producer dropped its handle
    writer.flush()?;
    stats.flushes.fetch_add(1, Ordering::Relaxed);
    Ok(())
}
