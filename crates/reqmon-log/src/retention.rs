//! Bulk removal of the request log.

use rusqlite::Connection;

use crate::error::LogError;
use crate::store;

/// Removes every record. Idempotent: an empty log clears to zero.
///
/// There is no soft delete and no confirmation step here; callers confirm
/// before invoking it. Id assignment continues from the previous maximum.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn clear_all(conn: &Connection) -> Result<usize, LogError> {
    let removed = store::clear(conn)?;
    tracing::info!(removed, "cleared request log");
    Ok(removed)
}
