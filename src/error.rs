//! Error types for csvherd
//!
//! This module defines the error hierarchy for the export engine:
//! - Configuration and CLI errors
//! - Row-source (cursor) errors
//! - Output sink errors
//! - Worker thread errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Errors should be actionable - include context about what failed
//! - Configuration and capability errors are fatal before any worker starts
//! - A sink error fails the whole job; a source error fails its shard

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the csvherd application
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Row-source errors (cursor open/fetch failure)
    #[error("Row source error: {0}")]
    Source(#[from] SourceError),

    /// Output sink errors (write/flush failure)
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Table name missing or blank
    #[error("Table name is required and must not be blank")]
    BlankTable,

    /// Database file does not exist
    #[error("Database file not found: {path}")]
    DatabaseNotFound { path: PathBuf },

    /// Nothing to export
    #[error("Table '{table}' has no rows to export")]
    NoRows { table: String },

    /// Flush cadence must be at least 1
    #[error("Flush interval must be at least 1 record")]
    InvalidFlushInterval,
}

/// Row-source and capability errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Underlying driver error
    #[error("Driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// Failed to open a cursor over the table
    #[error("Failed to open cursor over '{table}': {reason}")]
    OpenFailed { table: String, reason: String },

    /// Server version banner did not match the expected pattern.
    /// There is no safe default for pagination support, so this is fatal.
    #[error("Unparseable server version banner: '{banner}'")]
    UnparseableVersion { banner: String },

    /// Cursor reader thread went away without finishing the row stream
    #[error("Row cursor disconnected mid-stream")]
    Disconnected,
}

/// Output sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// File creation or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Sink thread gone - writes after a fatal sink failure land here
    #[error("Sink channel closed")]
    ChannelClosed,

    /// Sink thread panicked
    #[error("Sink writer thread panicked")]
    Panicked,
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Failed to spawn the shard thread
    #[error("Failed to spawn shard {index}: {reason}")]
    SpawnFailed { index: usize, reason: String },

    /// Shard thread panicked
    #[error("Shard {index} panicked")]
    Panicked { index: usize },
}

/// Convenience result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;
