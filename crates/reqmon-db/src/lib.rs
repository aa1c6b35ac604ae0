//! Database layer for the reqmon request log.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and the embedded migrations that create the `request_logs` table and its
//! secondary indexes.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a single-node log needs no database server.
//!   WAL lets report queries read while a request is being appended.
//! - **`r2d2` connection pool**: bounded connection reuse shared between the
//!   HTTP handlers' blocking tasks.
//! - **Embedded migrations**: SQL files are compiled in with `include_str!`
//!   so the schema always matches the binary.
//! - **`fold_case` SQL function**: registered on every pooled connection so
//!   free-text search ignores case beyond ASCII.

mod functions;
mod migrations;
mod pool;

pub use functions::{register_functions, FOLD_CASE};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
