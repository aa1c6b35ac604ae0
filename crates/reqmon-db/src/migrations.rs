//! Embedded schema migrations for the request log.
//!
//! Each migration is a SQL file compiled into the binary. The names of
//! applied migrations live in `_reqmon_migrations`; on every start-up the
//! runner applies whatever is missing, in list order.

use std::collections::HashSet;

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// Append only. Never edit a migration once it has shipped.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_request_logs",
        sql: include_str!("migrations/000_request_logs.sql"),
    },
    Migration {
        name: "001_device_type_index",
        sql: include_str!("migrations/001_device_type_index.sql"),
    },
];

const TRACKING_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS _reqmon_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Errors raised while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The `_reqmon_migrations` table could not be created or read.
    #[error("cannot read migration history: {0}")]
    History(rusqlite::Error),

    /// A migration's SQL failed; nothing from it was kept.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },
}

/// Applies every migration not yet recorded and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError::History` if the tracking table is unusable and
/// `MigrationError::ExecutionFailed` for the first migration that fails.
/// Migrations before the failing one stay applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply_pending(conn, MIGRATIONS)
}

fn apply_pending(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute_batch(TRACKING_TABLE_SQL)
        .map_err(MigrationError::History)?;
    let done = applied_names(conn).map_err(MigrationError::History)?;

    let pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| !done.contains(m.name))
        .collect();

    for migration in &pending {
        tracing::info!(migration = migration.name, "applying migration");
        apply_one(conn, migration).map_err(|source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        })?;
    }

    Ok(pending.len())
}

fn applied_names(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM _reqmon_migrations")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(names)
}

/// The migration body and its tracking row commit together or not at all.
fn apply_one(conn: &Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _reqmon_migrations (name) VALUES (?1)",
        [migration.name],
    )?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        Connection::open_in_memory().expect("should open in-memory db")
    }

    fn schema_object_exists(conn: &Connection, kind: &str, name: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
            [kind, name],
            |row| row.get(0),
        )
        .expect("should query sqlite_master")
    }

    #[test]
    fn fresh_database_gets_every_migration() {
        let conn = fresh();
        assert_eq!(run_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(applied_names(&conn).unwrap().len(), MIGRATIONS.len());
        assert!(schema_object_exists(&conn, "table", "request_logs"));
    }

    #[test]
    fn second_run_applies_nothing() {
        let conn = fresh();
        run_migrations(&conn).unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn only_missing_migrations_run() {
        let conn = fresh();
        assert_eq!(apply_pending(&conn, &MIGRATIONS[..1]).unwrap(), 1);
        assert!(!schema_object_exists(&conn, "index", "idx_request_logs_device_type"));

        assert_eq!(run_migrations(&conn).unwrap(), 1);
        assert!(schema_object_exists(&conn, "index", "idx_request_logs_device_type"));
    }

    #[test]
    fn lookup_indexes_exist() {
        let conn = fresh();
        run_migrations(&conn).unwrap();
        for index in [
            "idx_request_logs_timestamp",
            "idx_request_logs_ip_address",
            "idx_request_logs_device_type",
        ] {
            assert!(schema_object_exists(&conn, "index", index), "missing {index}");
        }
    }

    #[test]
    fn unknown_device_label_violates_check() {
        let conn = fresh();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO request_logs (method, url, ip_address, device_type)
             VALUES ('GET', 'http://example.com/', '203.0.113.5', 'Phablet')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn failed_migration_leaves_no_trace() {
        let conn = fresh();
        let broken = [Migration {
            name: "900_half_done",
            sql: "CREATE TABLE half_done (id INTEGER PRIMARY KEY);
                  INSERT INTO no_such_table VALUES (1);",
        }];

        let err = apply_pending(&conn, &broken).expect_err("migration should fail");
        assert!(
            matches!(&err, MigrationError::ExecutionFailed { name, .. } if name == "900_half_done"),
            "unexpected error: {err:?}"
        );
        assert!(!schema_object_exists(&conn, "table", "half_done"));
        assert!(applied_names(&conn).unwrap().is_empty());
    }
}
