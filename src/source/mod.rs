//! Row-source abstraction consumed by the export engine
//!
//! The engine pulls rows through two narrow traits:
//!
//! - [`TableSource`] - shared, thread-safe factory for cursors plus the
//!   one-time count query and the capability descriptor
//! - [`RowCursor`] - a forward-only cursor over one shard's offset range
//!   (or the whole table in degraded mode)
//!
//! Raw column values are `Option<Vec<u8>>`: `None` is the explicit NULL
//! marker, anything else is the value's text/byte form. Conversion to CSV
//! fields happens in the shard exporter, not here.

pub mod capability;
pub mod sqlite;

use crate::error::SourceError;
use crate::export::plan::Partition;

pub use capability::{offset_pagination_from_banner, SourceCapabilities};
pub use sqlite::SqliteSource;

/// A raw column value as fetched from the driver. `None` means SQL NULL.
pub type RawValue = Option<Vec<u8>>;

/// One fetched row: raw values positionally aligned to the cursor's columns
pub type RawRow = Vec<RawValue>;

/// Forward-only cursor over a range of a table.
///
/// Within one cursor, rows come back in the source query's own order; the
/// engine relies on nothing beyond that.
pub trait RowCursor: Send {
    /// Ordered column names for this cursor
    fn columns(&self) -> &[String];

    /// Fetch the next row, or `None` when the range is exhausted
    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError>;
}

/// Factory for row cursors over one table, shared by all shard exporters.
pub trait TableSource: Send + Sync {
    /// What this source can do; read once by the coordinator at startup
    fn capabilities(&self) -> Result<SourceCapabilities, SourceError>;

    /// Count the table's rows. Called exactly once, before planning;
    /// the result is treated as immutable for the job's duration.
    fn count_rows(&self, table: &str) -> Result<u64, SourceError>;

    /// Open a cursor over `range`, or over the whole table when `range`
    /// is `None` (degraded single-shard mode - no offset/limit applied).
    fn open(&self, table: &str, range: Option<&Partition>)
        -> Result<Box<dyn RowCursor>, SourceError>;
}
