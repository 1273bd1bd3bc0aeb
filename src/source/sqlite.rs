//! SQLite row source backed by rusqlite
//!
//! Each cursor gets its own connection on a dedicated reader thread, which
//! streams rows into a bounded channel. Two reasons for the extra thread:
//! rusqlite statements borrow their connection (so a long-lived cursor
//! cannot hold both), and one-connection-per-shard keeps concurrent shards
//! from serializing on a shared handle.
//!
//! SQLite executes LIMIT/OFFSET reliably on every supported version, so
//! this source always reports full range-pagination capability.

use crate::error::SourceError;
use crate::export::plan::Partition;
use crate::source::{RawRow, RawValue, RowCursor, SourceCapabilities, TableSource};
use crossbeam_channel::{bounded, Receiver};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

/// Rows buffered between the reader thread and the consuming shard
const CURSOR_CHANNEL_SIZE: usize = 256;

/// Row source over a SQLite database file
pub struct SqliteSource {
    path: PathBuf,
}

impl SqliteSource {
    /// Create a source over an existing database file.
    ///
    /// No connection is opened here; every operation opens its own so the
    /// source can be shared freely across shard threads.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, SourceError> {
        let conn = Connection::open_with_flags(
            &self.path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        Ok(conn)
    }
}

impl TableSource for SqliteSource {
    fn capabilities(&self) -> Result<SourceCapabilities, SourceError> {
        Ok(SourceCapabilities::full())
    }

    fn count_rows(&self, table: &str) -> Result<u64, SourceError> {
        let conn = self.connect()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        debug!(table = table, rows = count, "Counted table rows");
        Ok(count.max(0) as u64)
    }

    fn open(
        &self,
        table: &str,
        range: Option<&Partition>,
    ) -> Result<Box<dyn RowCursor>, SourceError> {
        let cursor = SqliteCursor::open(&self.path, table, range)?;
        Ok(Box::new(cursor))
    }
}

/// Cursor over one offset range, fed by a dedicated reader thread
pub struct SqliteCursor {
    columns: Vec<String>,
    rows: Receiver<Result<RawRow, SourceError>>,
    reader: Option<JoinHandle<()>>,
}

impl SqliteCursor {
    fn open(path: &Path, table: &str, range: Option<&Partition>) -> Result<Self, SourceError> {
        let sql = select_sql(table, range);
        let label = range.map_or_else(|| "full-scan".to_string(), Partition::label);

        // The reader reports its column list (or open failure) through a
        // one-shot handshake channel before any rows flow.
        let (handshake_tx, handshake_rx) = bounded::<Result<Vec<String>, SourceError>>(1);
        let (row_tx, row_rx) = bounded::<Result<RawRow, SourceError>>(CURSOR_CHANNEL_SIZE);

        let db_path = path.to_path_buf();
        let table_name = table.to_string();
        let thread_sql = sql.clone();

        let reader = thread::Builder::new()
            .name(format!("cursor-{}", label))
            .spawn(move || {
                let conn = match Connection::open_with_flags(
                    &db_path,
                    rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
                ) {
                    Ok(conn) => conn,
                    Err(e) => {
                        let _ = handshake_tx.send(Err(SourceError::Driver(e)));
                        return;
                    }
                };

                let mut stmt = match conn.prepare(&thread_sql) {
                    Ok(stmt) => stmt,
                    Err(e) => {
                        let _ = handshake_tx.send(Err(SourceError::OpenFailed {
                            table: table_name,
                            reason: e.to_string(),
                        }));
                        return;
                    }
                };

                let columns: Vec<String> =
                    stmt.column_names().iter().map(|c| c.to_string()).collect();
                let column_count = columns.len();
                if handshake_tx.send(Ok(columns)).is_err() {
                    return;
                }

                let mut rows = match stmt.query([]) {
                    Ok(rows) => rows,
                    Err(e) => {
                        let _ = row_tx.send(Err(SourceError::Driver(e)));
                        return;
                    }
                };

                loop {
                    match rows.next() {
                        Ok(Some(row)) => {
                            let mut values: RawRow = Vec::with_capacity(column_count);
                            for i in 0..column_count {
                                match row.get_ref(i) {
                                    Ok(value) => values.push(raw_value(value)),
                                    Err(e) => {
                                        let _ = row_tx.send(Err(SourceError::Driver(e)));
                                        return;
                                    }
                                }
                            }
                            // Consumer dropped the cursor; stop reading
                            if row_tx.send(Ok(values)).is_err() {
                                trace!("Cursor consumer gone, stopping reader");
                                return;
                            }
                        }
                        Ok(None) => return,
                        Err(e) => {
                            let _ = row_tx.send(Err(SourceError::Driver(e)));
                            return;
                        }
                    }
                }
            })
            .map_err(|e| SourceError::OpenFailed {
                table: table.to_string(),
                reason: format!("Failed to spawn cursor reader: {}", e),
            })?;

        let columns = match handshake_rx.recv() {
            Ok(Ok(columns)) => columns,
            Ok(Err(e)) => {
                let _ = reader.join();
                return Err(e);
            }
            Err(_) => {
                let _ = reader.join();
                return Err(SourceError::Disconnected);
            }
        };

        debug!(sql = %sql, columns = columns.len(), "Opened cursor");

        Ok(Self {
            columns,
            rows: row_rx,
            reader: Some(reader),
        })
    }
}

impl RowCursor for SqliteCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        match self.rows.recv() {
            Ok(Ok(row)) => Ok(Some(row)),
            Ok(Err(e)) => Err(e),
            // Reader finished and dropped its sender - end of range
            Err(_) => Ok(None),
        }
    }
}

impl Drop for SqliteCursor {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            // Unblock the reader if it is waiting on a full channel
            let drain = std::mem::replace(&mut self.rows, bounded(0).1);
            drop(drain);
            let _ = reader.join();
        }
    }
}

/// Build the shard's SELECT. A `None` range means the degraded single-shard
/// mode: the whole table, with no LIMIT/OFFSET at all.
fn select_sql(table: &str, range: Option<&Partition>) -> String {
    let table = quote_identifier(table);
    match range {
        Some(p) => format!("SELECT * FROM {} LIMIT {} OFFSET {}", table, p.len(), p.low),
        None => format!("SELECT * FROM {}", table),
    }
}

/// Quote a SQL identifier, escaping embedded quotes
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a driver value to the engine's raw form. NULL maps to `None`;
/// everything else becomes its text/byte representation.
fn raw_value(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(t) => Some(t.to_vec()),
        ValueRef::Blob(b) => Some(b.to_vec()),
    }
}
