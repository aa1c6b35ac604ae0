//! Application-defined SQL functions.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Name of the Unicode lowercase function used by free-text search.
pub const FOLD_CASE: &str = "fold_case";

/// Registers the reqmon SQL functions on `conn`.
///
/// `fold_case(text)` lowercases with full Unicode rules, unlike SQLite's
/// built-in `lower()`, which only folds ASCII. `NULL` stays `NULL`.
///
/// Every connection that runs a search needs this; pooled connections get
/// it from [`create_pool`](crate::create_pool).
///
/// # Errors
///
/// Returns the SQLite error if registration fails.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_CASE,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
}
