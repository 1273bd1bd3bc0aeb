//! csvherd - Sharded SQL table to CSV exporter
//!
//! Bulk-exports the rows of a relational table to a single CSV file,
//! splitting the row space into contiguous offset ranges and pulling each
//! range on its own thread to cut wall-clock time on large tables.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Table (N rows)                        │
//! └───────┬──────────────────┬──────────────────┬───────────────┘
//!         │ [0, a]           │ [a+1, b]         │ [b+1, N-1]
//!         ▼                  ▼                  ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   shard-0    │   │   shard-1    │   │   shard-2    │
//! │ (own cursor) │   │ (own cursor) │   │ (own cursor) │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!              ┌──────────────────────────┐
//!              │       CSV sink           │
//!              │  (crossbeam bounded)     │
//!              │  - single writer thread  │
//!              │  - header exactly once   │
//!              │  - whole-record writes   │
//!              └────────────┬─────────────┘
//!                           ▼
//!                   ┌──────────────┐
//!                   │  output.csv  │
//!                   └──────────────┘
//! ```
//!
//! The sink's writer thread is the only code that touches the output file,
//! which makes the header-once and no-interleaving guarantees structural
//! rather than lock-discipline conventions. Sources that cannot paginate
//! ranges (reported through their capability descriptor) degrade the plan
//! to a single unrestricted shard.
//!
//! # Example
//!
//! ```bash
//! # Export a table over 8 shards
//! csvherd data.db -t events -s 8 -o events.csv
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod progress;
pub mod sink;
pub mod source;

pub use config::{CliArgs, ExportConfig};
pub use error::{ExportError, Result};
pub use export::{ExportCoordinator, ExportJob, ExportResult, Partition};
pub use sink::{CsvSink, SinkHandle, SinkOptions};
pub use source::{RowCursor, SourceCapabilities, SqliteSource, TableSource};
