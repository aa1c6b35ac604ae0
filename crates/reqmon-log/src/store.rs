//! Persistence operations for the request log.
//!
//! Writes go through [`append`], a single `INSERT ... RETURNING id`, so id
//! assignment and insertion are one atomic step under SQLite's write lock.
//! `AUTOINCREMENT` keeps the id high-water mark across [`clear`], so ids are
//! never reused.
//!
//! Reads take a [`LogFilter`]. Every value in it is bound as a parameter;
//! only allow-listed column names are ever formatted into SQL. Free-text
//! search calls the `fold_case` SQL function, so the connection must have
//! gone through `reqmon_db::register_functions` (pooled ones have).

use rusqlite::types::{ToSql, Type};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::LogError;
use reqmon_db::FOLD_CASE;
use reqmon_types::{DeviceType, LogRecord, NewLogRecord, SortColumn, SortOrder};

const SELECT_COLUMNS: &str = "id, timestamp, method, url, ip_address, browser, device_type, \
                              referer, status_code, user_agent";

/// Columns the free-text search is matched against.
const SEARCH_COLUMNS: [&str; 6] = ["url", "ip_address", "user_agent", "referer", "browser", "method"];

/// Predicate over the request log. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Case-insensitive (Unicode) literal substring matched against any of
    /// url, ip_address, user_agent, referer, browser, or method.
    pub search: Option<String>,
    /// Exact device class.
    pub device_type: Option<DeviceType>,
    /// Exact client IP.
    pub ip_address: Option<String>,
    /// Inclusive lower bound on `timestamp`, in storage format.
    pub since: Option<String>,
    /// Inclusive upper bound on `timestamp`, in storage format.
    pub until: Option<String>,
}

impl LogFilter {
    /// Returns `true` if the filter matches every record.
    pub fn is_empty(&self) -> bool {
        self.search_term().is_none()
            && self.device_type.is_none()
            && self.ip_address.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Builds the `WHERE` body and its bound values. Placeholders are
    /// numbered from `?1`; the caller continues numbering after them.
    fn to_sql(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(term) = self.search_term() {
            values.push(Box::new(term.to_lowercase()));
            let idx = values.len();
            let any_column = SEARCH_COLUMNS
                .iter()
                .map(|col| format!("instr({FOLD_CASE}({col}), ?{idx}) > 0"))
                .collect::<Vec<_>>()
                .join(" OR ");
            clauses.push(format!("({any_column})"));
        }

        if let Some(device) = self.device_type {
            values.push(Box::new(device.as_str()));
            clauses.push(format!("device_type = ?{}", values.len()));
        }

        if let Some(ref ip) = self.ip_address {
            values.push(Box::new(ip.clone()));
            clauses.push(format!("ip_address = ?{}", values.len()));
        }

        if let Some(ref since) = self.since {
            values.push(Box::new(since.clone()));
            clauses.push(format!("timestamp >= ?{}", values.len()));
        }

        if let Some(ref until) = self.until {
            values.push(Box::new(until.clone()));
            clauses.push(format!("timestamp <= ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            "1=1".to_string()
        } else {
            clauses.join(" AND ")
        };
        (where_clause, values)
    }
}

/// Appends a record and returns its newly assigned id.
///
/// A record without a timestamp is stamped with the append time.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure. The insert is not retried.
pub fn append(conn: &Connection, record: &NewLogRecord) -> Result<i64, LogError> {
    let id = conn.query_row(
        "INSERT INTO request_logs
            (timestamp, method, url, ip_address, browser, device_type, referer, status_code, user_agent)
         VALUES (COALESCE(?1, datetime('now')), ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING id",
        params![
            record.timestamp,
            record.method,
            record.url,
            record.ip_address,
            record.browser,
            record.device_type.as_str(),
            record.referer,
            record.status_code,
            record.user_agent,
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Counts records matching `filter`.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn count(conn: &Connection, filter: &LogFilter) -> Result<i64, LogError> {
    let (where_clause, values) = filter.to_sql();
    let sql = format!("SELECT COUNT(*) FROM request_logs WHERE {where_clause}");
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| &**v).collect();
    let total = conn.query_row(&sql, refs.as_slice(), |row| row.get(0))?;
    Ok(total)
}

/// Returns one window of matching records in the requested order.
///
/// Equal sort keys are ordered by `id` in the same direction, so repeated
/// calls return rows in the same order.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn query(
    conn: &Connection,
    filter: &LogFilter,
    sort_by: SortColumn,
    sort_order: SortOrder,
    limit: i64,
    offset: i64,
) -> Result<Vec<LogRecord>, LogError> {
    let (where_clause, mut values) = filter.to_sql();
    let dir = sort_order.as_sql();
    let order_by = match sort_by {
        SortColumn::Id => format!("id {dir}"),
        column => format!("{column} {dir}, id {dir}"),
    };

    let limit_idx = values.len() + 1;
    let offset_idx = values.len() + 2;
    values.push(Box::new(limit.max(0)));
    values.push(Box::new(offset.max(0)));

    let sql = format!(
        "SELECT {SELECT_COLUMNS}
         FROM request_logs
         WHERE {where_clause}
         ORDER BY {order_by}
         LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    );
    let refs: Vec<&dyn ToSql> = values.iter().map(|v| &**v).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(refs.as_slice(), map_row_to_record)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?);
    }
    Ok(records)
}

/// Fetches a single record. `Ok(None)` means no record has that id.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<LogRecord>, LogError> {
    let record = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM request_logs WHERE id = ?1"),
            [id],
            map_row_to_record,
        )
        .optional()?;
    Ok(record)
}

/// Deletes every record and returns how many were removed.
///
/// # Errors
///
/// Returns `LogError::Storage` on SQL failure.
pub fn clear(conn: &Connection) -> Result<usize, LogError> {
    Ok(conn.execute("DELETE FROM request_logs", [])?)
}

fn map_row_to_record(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    let device: String = row.get(6)?;
    let device_type = device
        .parse::<DeviceType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(LogRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        method: row.get(2)?,
        url: row.get(3)?,
        ip_address: row.get(4)?,
        browser: row.get(5)?,
        device_type,
        referer: row.get(7)?,
        status_code: row.get(8)?,
        user_agent: row.get(9)?,
    })
}
