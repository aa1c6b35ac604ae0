//! The report engine: filter, sort, and paginate the request log.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::LogError;
use crate::store::{self, LogFilter};
use reqmon_types::{LogRecord, SortColumn, SortOrder, PAGE_SIZE};

/// One report query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub filter: LogFilter,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    /// 1-based page number. Values below 1 are treated as 1.
    pub page: i64,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            filter: LogFilter::default(),
            sort_by: SortColumn::default(),
            sort_order: SortOrder::default(),
            page: 1,
        }
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub logs: Vec<LogRecord>,
    /// Records matching the filter across all pages.
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Maps a caller-supplied sort column onto the allow-list.
///
/// Unknown or missing names fall back to `timestamp`; this never fails.
pub fn resolve_sort_column(requested: Option<&str>) -> SortColumn {
    let Some(raw) = requested.filter(|r| !r.trim().is_empty()) else {
        return SortColumn::default();
    };
    raw.parse().unwrap_or_else(|_| {
        tracing::debug!(requested = raw, "unsupported sort column, using default");
        SortColumn::default()
    })
}

/// Number of pages needed for `total` records. Zero records means zero pages.
pub fn total_pages(total: i64) -> i64 {
    if total <= 0 {
        0
    } else {
        (total + PAGE_SIZE - 1) / PAGE_SIZE
    }
}

/// Runs a report query.
///
/// The count and the page are read inside one transaction, so `total`
/// and `logs` always describe the same snapshot. A page past the end
/// yields an empty `logs` with the real totals.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn search(conn: &Connection, request: &SearchRequest) -> Result<SearchPage, LogError> {
    let page = request.page.max(1);
    let offset = (page - 1).saturating_mul(PAGE_SIZE);

    let tx = conn.unchecked_transaction()?;
    let total = store::count(&tx, &request.filter)?;
    let logs = if offset >= total {
        Vec::new()
    } else {
        store::query(
            &tx,
            &request.filter,
            request.sort_by,
            request.sort_order,
            PAGE_SIZE,
            offset,
        )?
    };
    tx.commit()?;

    tracing::debug!(
        total,
        page,
        returned = logs.len(),
        sort_by = %request.sort_by,
        sort_order = request.sort_order.as_sql(),
        "request log search"
    );

    Ok(SearchPage {
        logs,
        total,
        total_pages: total_pages(total),
        current_page: page,
    })
}

/// Returns every field of one record, or `Ok(None)` if it does not exist.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn get_details(conn: &Connection, id: i64) -> Result<Option<LogRecord>, LogError> {
    store::get_by_id(conn, id)
}
