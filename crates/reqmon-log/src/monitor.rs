//! Pool-owning facade over ingestion, query, and retention.
//!
//! Every method checks a connection out of the pool, runs synchronously,
//! and returns it. Async callers should wrap calls in `spawn_blocking`.

use reqmon_db::{run_migrations, DbPool};
use reqmon_ingest::{classify, CaptureGate, RawRequest, SkipReason};
use reqmon_types::LogRecord;

use crate::error::MonitorError;
use crate::query::{self, SearchPage, SearchRequest};
use crate::{retention, store};

/// Outcome of [`RequestMonitor::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// The request was appended with this id.
    Stored(i64),
    /// The capture gate turned the request away.
    Skipped(SkipReason),
}

/// The request monitor: one log, one pool, one capture gate.
#[derive(Clone)]
pub struct RequestMonitor {
    pool: DbPool,
    gate: CaptureGate,
}

impl RequestMonitor {
    pub fn new(pool: DbPool, gate: CaptureGate) -> Self {
        Self { pool, gate }
    }

    /// Creates or upgrades the schema. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Pool` or `MonitorError::Migration`.
    pub fn initialize(&self) -> Result<usize, MonitorError> {
        let conn = self.pool.get()?;
        let applied = run_migrations(&conn)?;
        if applied > 0 {
            tracing::info!(count = applied, "applied request log migrations");
        }
        Ok(applied)
    }

    /// Lifecycle hook for a process manager bringing the monitor up.
    ///
    /// # Errors
    ///
    /// Same as [`initialize`](Self::initialize).
    pub fn on_enable(&self) -> Result<usize, MonitorError> {
        tracing::info!("request monitor enabled");
        self.initialize()
    }

    /// Lifecycle hook for shutdown. The log is kept unless `clear` is set.
    ///
    /// # Errors
    ///
    /// Returns an error only when `clear` is set and clearing fails.
    pub fn on_disable(&self, clear: bool) -> Result<(), MonitorError> {
        if clear {
            self.clear_all()?;
        }
        tracing::info!(cleared = clear, "request monitor disabled");
        Ok(())
    }

    /// Gates, classifies, and appends one request.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Ingest` for an unusable descriptor and
    /// `MonitorError::Pool`/`MonitorError::Log` when the append fails.
    pub fn record(&self, request: &RawRequest) -> Result<Recorded, MonitorError> {
        if let Err(reason) = self.gate.admit(request) {
            tracing::debug!(path = request.path(), %reason, "request not recorded");
            return Ok(Recorded::Skipped(reason));
        }

        let record = classify(request)?;
        let conn = self.pool.get()?;
        let id = store::append(&conn, &record)?;

        tracing::debug!(
            id,
            method = %record.method,
            ip = %record.ip_address,
            device = %record.device_type,
            "recorded request"
        );
        Ok(Recorded::Stored(id))
    }

    /// Runs a report query.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Pool` or `MonitorError::Log`.
    pub fn search(&self, request: &SearchRequest) -> Result<SearchPage, MonitorError> {
        let conn = self.pool.get()?;
        Ok(query::search(&conn, request)?)
    }

    /// Looks up one record by id.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Pool` or `MonitorError::Log`. A missing
    /// record is `Ok(None)`.
    pub fn details(&self, id: i64) -> Result<Option<LogRecord>, MonitorError> {
        let conn = self.pool.get()?;
        Ok(query::get_details(&conn, id)?)
    }

    /// Empties the log and returns how many records were removed.
    ///
    /// # Errors
    ///
    /// Returns `MonitorError::Pool` or `MonitorError::Log`.
    pub fn clear_all(&self) -> Result<usize, MonitorError> {
        let conn = self.pool.get()?;
        Ok(retention::clear_all(&conn)?)
    }
}
