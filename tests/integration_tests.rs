//! Integration tests for csvherd
//!
//! Everything runs against throwaway SQLite files or in-memory fake
//! sources; no external services are required.

use csvherd::config::ExportConfig;
use csvherd::error::{ConfigError, ExportError, SourceError};
use csvherd::export::{ExportCoordinator, Partition};
use csvherd::source::{RowCursor, SourceCapabilities, SqliteSource, TableSource};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/// Build a people table with a known value pattern. Every third row has a
/// NULL note so the NULL-to-empty-string path is exercised throughout.
fn fixture_db(dir: &Path, rows: usize) -> PathBuf {
    let path = dir.join("fixture.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute(
        "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, note TEXT)",
        [],
    )
    .unwrap();
    let mut stmt = conn
        .prepare("INSERT INTO people (id, name, note) VALUES (?1, ?2, ?3)")
        .unwrap();
    for i in 0..rows {
        let note: Option<String> = if i % 3 == 0 {
            None
        } else {
            Some(format!("note, with \"quoting\" {}", i))
        };
        stmt.execute(rusqlite::params![i as i64, format!("name-{}", i), note])
            .unwrap();
    }
    drop(stmt);
    path
}

fn config(db: PathBuf, output: PathBuf, shards: usize) -> ExportConfig {
    ExportConfig {
        database: db,
        table: "people".into(),
        output_path: output,
        shards,
        with_header: true,
        flush_every: 100,
        show_progress: false,
    }
}

fn run_export(config: &ExportConfig) -> csvherd::Result<csvherd::ExportResult> {
    let source = Arc::new(SqliteSource::new(&config.database));
    ExportCoordinator::new(config, source)?.run(None)
}

#[test]
fn test_sharded_export_round_trip() {
    let dir = tempdir().unwrap();
    let db = fixture_db(dir.path(), 1000);
    let output = dir.path().join("people.csv");

    let result = run_export(&config(db, output.clone(), 4)).unwrap();
    assert_eq!(result.total_rows, 1000);
    assert_eq!(result.rows_exported, 1000);
    assert_eq!(result.shard_count, 4);
    assert!(!result.degraded);

    // Parse back and compare the row multiset; cross-shard order is
    // unspecified, so compare by id
    let mut reader = csv::Reader::from_path(&output).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        vec!["id", "name", "note"]
    );

    let mut by_id: HashMap<i64, (String, String)> = HashMap::new();
    for record in reader.records() {
        let record = record.unwrap();
        assert_eq!(record.len(), 3);
        let id: i64 = record[0].parse().unwrap();
        assert!(
            by_id.insert(id, (record[1].into(), record[2].into())).is_none(),
            "duplicate id {}",
            id
        );
    }
    assert_eq!(by_id.len(), 1000);

    for i in 0..1000i64 {
        let (name, note) = &by_id[&i];
        assert_eq!(name, &format!("name-{}", i));
        if i % 3 == 0 {
            // NULL exported as empty string
            assert_eq!(note, "");
        } else {
            assert_eq!(note, &format!("note, with \"quoting\" {}", i));
        }
    }
}

#[test]
fn test_single_header_line_under_sharding() {
    let dir = tempdir().unwrap();
    let db = fixture_db(dir.path(), 200);
    let output = dir.path().join("people.csv");

    run_export(&config(db, output.clone(), 8)).unwrap();

    let content = std::fs::read_to_string(&output).unwrap();
    let header_lines = content.lines().filter(|l| *l == "id,name,note").count();
    assert_eq!(header_lines, 1);
    assert!(content.starts_with("id,name,note\n"));
}

#[test]
fn test_no_header_export() {
    let dir = tempdir().unwrap();
    let db = fixture_db(dir.path(), 50);
    let output = dir.path().join("people.csv");

    let mut cfg = config(db, output.clone(), 3);
    cfg.with_header = false;
    run_export(&cfg).unwrap();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(&output)
        .unwrap();
    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 50);
    for record in &records {
        assert_ne!(&record[0], "id");
    }
}

#[test]
fn test_shard_count_clamps_to_row_count() {
    let dir = tempdir().unwrap();
    let db = fixture_db(dir.path(), 7);
    let output = dir.path().join("people.csv");

    let result = run_export(&config(db, output.clone(), 10)).unwrap();
    assert_eq!(result.shard_count, 7);
    assert_eq!(result.rows_exported, 7);
}

#[test]
fn test_empty_table_fails_before_any_write() {
    let dir = tempdir().unwrap();
    let db = fixture_db(dir.path(), 0);
    let output = dir.path().join("people.csv");

    let err = run_export(&config(db, output.clone(), 4)).unwrap_err();
    assert!(matches!(
        err,
        ExportError::Config(ConfigError::NoRows { .. })
    ));
    // The artifact must never have been created
    assert!(!output.exists());
}

/// In-memory source that records how each cursor was opened, for asserting
/// the degradation and partitioning behavior at the trait boundary.
struct FakeSource {
    rows: Vec<Vec<Option<Vec<u8>>>>,
    paginated: bool,
    opens: Mutex<Vec<Option<Partition>>>,
}

impl FakeSource {
    fn new(rows: usize, paginated: bool) -> Self {
        Self {
            rows: (0..rows)
                .map(|i| vec![Some(i.to_string().into_bytes()), None])
                .collect(),
            paginated,
            opens: Mutex::new(Vec::new()),
        }
    }
}

struct FakeCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Option<Vec<u8>>>>,
    fail_after: Option<usize>,
    served: usize,
}

impl RowCursor for FakeCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Option<Vec<u8>>>>, SourceError> {
        if let Some(limit) = self.fail_after {
            if self.served >= limit {
                return Err(SourceError::OpenFailed {
                    table: "fake".into(),
                    reason: "injected fetch failure".into(),
                });
            }
        }
        self.served += 1;
        Ok(self.rows.next())
    }
}

impl TableSource for FakeSource {
    fn capabilities(&self) -> Result<SourceCapabilities, SourceError> {
        Ok(if self.paginated {
            SourceCapabilities::full()
        } else {
            SourceCapabilities::sequential_only()
        })
    }

    fn count_rows(&self, _table: &str) -> Result<u64, SourceError> {
        Ok(self.rows.len() as u64)
    }

    fn open(
        &self,
        _table: &str,
        range: Option<&Partition>,
    ) -> Result<Box<dyn RowCursor>, SourceError> {
        self.opens.lock().unwrap().push(range.copied());
        let rows = match range {
            Some(p) => self.rows[p.low as usize..=p.high as usize].to_vec(),
            None => self.rows.clone(),
        };
        Ok(Box::new(FakeCursor {
            columns: vec!["id".into(), "note".into()],
            rows: rows.into_iter(),
            fail_after: None,
            served: 0,
        }))
    }
}

#[test]
fn test_degraded_mode_uses_one_unrestricted_cursor() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("fake.csv");

    let source = Arc::new(FakeSource::new(100, false));
    let cfg = ExportConfig {
        database: PathBuf::new(),
        table: "fake".into(),
        output_path: output.clone(),
        shards: 8,
        with_header: true,
        flush_every: 10,
        show_progress: false,
    };

    let coordinator =
        ExportCoordinator::new(&cfg, Arc::clone(&source) as Arc<dyn TableSource>).unwrap();
    assert!(coordinator.job().degraded());
    let result = coordinator.run(None).unwrap();

    // Requested 8 shards, got exactly one cursor with no range restriction
    assert_eq!(result.shard_count, 1);
    assert!(result.degraded);
    assert_eq!(result.rows_exported, 100);

    let opens = source.opens.lock().unwrap();
    assert_eq!(opens.len(), 1);
    assert!(opens[0].is_none());
}

#[test]
fn test_paginated_source_gets_one_cursor_per_partition() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("fake.csv");

    let source = Arc::new(FakeSource::new(100, true));
    let cfg = ExportConfig {
        database: PathBuf::new(),
        table: "fake".into(),
        output_path: output.clone(),
        shards: 3,
        with_header: true,
        flush_every: 10,
        show_progress: false,
    };

    let result = ExportCoordinator::new(&cfg, Arc::clone(&source) as Arc<dyn TableSource>)
        .unwrap()
        .run(None)
        .unwrap();
    assert_eq!(result.rows_exported, 100);

    let mut opens = source
        .opens
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.unwrap())
        .collect::<Vec<_>>();
    opens.sort_by_key(|p| p.index);
    assert_eq!(opens.len(), 3);
    assert_eq!((opens[0].low, opens[0].high), (0, 32));
    assert_eq!((opens[1].low, opens[1].high), (33, 65));
    assert_eq!((opens[2].low, opens[2].high), (66, 99));
}

/// Source whose cursors fail after a few rows; the job must fail while
/// sibling shards still run to their own terminal state.
struct FailingSource {
    inner: FakeSource,
}

impl TableSource for FailingSource {
    fn capabilities(&self) -> Result<SourceCapabilities, SourceError> {
        self.inner.capabilities()
    }

    fn count_rows(&self, table: &str) -> Result<u64, SourceError> {
        self.inner.count_rows(table)
    }

    fn open(
        &self,
        _table: &str,
        range: Option<&Partition>,
    ) -> Result<Box<dyn RowCursor>, SourceError> {
        // Shard 0 dies after 5 rows; the others complete normally
        let fail_after = match range {
            Some(p) if p.index == 0 => Some(5),
            _ => None,
        };
        let rows = match range {
            Some(p) => self.inner.rows[p.low as usize..=p.high as usize].to_vec(),
            None => self.inner.rows.clone(),
        };
        Ok(Box::new(FakeCursor {
            columns: vec!["id".into(), "note".into()],
            rows: rows.into_iter(),
            fail_after,
            served: 0,
        }))
    }
}

#[test]
fn test_shard_failure_fails_job_but_keeps_partial_output() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("fake.csv");

    let source = Arc::new(FailingSource {
        inner: FakeSource::new(300, true),
    });
    let cfg = ExportConfig {
        database: PathBuf::new(),
        table: "fake".into(),
        output_path: output.clone(),
        shards: 3,
        with_header: true,
        flush_every: 10,
        show_progress: false,
    };

    let err = ExportCoordinator::new(&cfg, source)
        .unwrap()
        .run(None)
        .unwrap_err();
    assert!(matches!(err, ExportError::Source(_)));

    // Partial output is an accepted outcome and is never deleted. The
    // surviving shards' rows must all be intact and well-formed.
    let mut reader = csv::Reader::from_path(&output).unwrap();
    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert!(records.len() >= 200, "sibling shards should have completed");
    for record in &records {
        assert_eq!(record.len(), 2);
    }
}
