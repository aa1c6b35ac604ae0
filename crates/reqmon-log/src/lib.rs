//! The reqmon request log: storage, report queries, and retention.
//!
//! Classified requests are appended to the `request_logs` table and never
//! modified afterwards. The report engine answers filter/sort/page queries
//! with a page of records plus the total match count, and the whole log can
//! be cleared in one step.
//!
//! # Layers
//!
//! | Module | Role |
//! |--------|------|
//! | `store` | `append`, `count`, `query`, `get_by_id`, `clear` over one connection |
//! | `query` | `search` (paged report) and `get_details` |
//! | `retention` | `clear_all` |
//! | `monitor` | [`RequestMonitor`], which owns the pool and exposes the entry points |
//!
//! # Usage
//!
//! ```rust,ignore
//! use reqmon_log::{LogFilter, RequestMonitor, SearchRequest};
//!
//! let monitor = RequestMonitor::new(pool, CaptureGate::default());
//! monitor.on_enable()?;
//! monitor.record(&raw_request)?;
//!
//! let page = monitor.search(&SearchRequest {
//!     filter: LogFilter {
//!         search: Some("checkout".to_string()),
//!         ..LogFilter::default()
//!     },
//!     ..SearchRequest::default()
//! })?;
//! ```

mod error;
mod monitor;
mod query;
mod retention;
mod store;

pub use error::{LogError, MonitorError};
pub use monitor::{Recorded, RequestMonitor};
pub use query::{get_details, resolve_sort_column, search, total_pages, SearchPage, SearchRequest};
pub use retention::clear_all;
pub use store::{append, clear, count, get_by_id, query, LogFilter};
