//! Error types for the request log.

use reqmon_db::MigrationError;
use reqmon_ingest::IngestError;

/// Errors that can occur during log store and query operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The underlying SQLite operation failed.
    #[error("log storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// Errors surfaced by [`RequestMonitor`](crate::RequestMonitor) entry points.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// No pooled connection could be obtained.
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A store or query operation failed.
    #[error(transparent)]
    Log(#[from] LogError),

    /// The request descriptor could not be classified.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Schema set-up failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}
