//! Shared types and constants for the reqmon request log.
//!
//! This crate holds the record shapes that flow between the ingestor, the
//! log store, and the HTTP service, together with the sort allow-list and
//! the timestamp format used on disk.
//!
//! Nothing here touches the database or the network, so every other crate
//! in the workspace can depend on it without pulling in a runtime.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of records returned per page by the query engine.
pub const PAGE_SIZE: i64 = 20;

/// Placeholder stored when a value (IP, browser, user agent) cannot be determined.
pub const UNKNOWN: &str = "Unknown";

/// Referer value stored when the request carried no `Referer` header.
pub const DIRECT_REFERER: &str = "Direct";

/// Status code stored when the host did not report one.
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// On-disk timestamp format (UTC). Lexicographic order equals time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Device class derived from the user agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    /// Anything that does not match a mobile signature.
    Desktop,
    /// Phones and other handheld devices.
    Mobile,
    /// Tablets (iPad and friends).
    Tablet,
}

impl DeviceType {
    /// Returns the canonical label stored in the `device_type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "Desktop",
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceType {
    type Err = ParseDeviceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Desktop" => Ok(Self::Desktop),
            "Mobile" => Ok(Self::Mobile),
            "Tablet" => Ok(Self::Tablet),
            _ => Err(ParseDeviceTypeError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown device type string.
#[derive(Debug, Clone)]
pub struct ParseDeviceTypeError(pub String);

impl std::fmt::Display for ParseDeviceTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown device type: {}", self.0)
    }
}

impl std::error::Error for ParseDeviceTypeError {}

/// Columns a caller may sort by.
///
/// Only these names ever reach an `ORDER BY` clause; anything else is
/// mapped to [`SortColumn::Timestamp`] before a query is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    Timestamp,
    IpAddress,
    Url,
    StatusCode,
    UserAgent,
    Id,
    Method,
    Browser,
    DeviceType,
    Referer,
}

impl SortColumn {
    /// Every sortable column, in allow-list order.
    pub const ALL: [SortColumn; 10] = [
        Self::Timestamp,
        Self::IpAddress,
        Self::Url,
        Self::StatusCode,
        Self::UserAgent,
        Self::Id,
        Self::Method,
        Self::Browser,
        Self::DeviceType,
        Self::Referer,
    ];

    /// Returns the column name as it appears in the `request_logs` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::IpAddress => "ip_address",
            Self::Url => "url",
            Self::StatusCode => "status_code",
            Self::UserAgent => "user_agent",
            Self::Id => "id",
            Self::Method => "method",
            Self::Browser => "browser",
            Self::DeviceType => "device_type",
            Self::Referer => "referer",
        }
    }
}

impl std::fmt::Display for SortColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortColumn {
    type Err = ParseSortColumnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|column| column.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseSortColumnError(s.to_string()))
    }
}

/// Error returned when a sort column is not on the allow-list.
#[derive(Debug, Clone)]
pub struct ParseSortColumnError(pub String);

impl std::fmt::Display for ParseSortColumnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unsupported sort column: {}", self.0)
    }
}

impl std::error::Error for ParseSortColumnError {}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[default]
    #[serde(rename = "DESC")]
    Desc,
}

impl SortOrder {
    /// Interprets a caller-supplied direction. Only `ASC` (any case) is
    /// ascending; everything else, including garbage, is descending.
    pub fn from_param(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    /// SQL keyword for this direction.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A classified request, ready to be appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLogRecord {
    /// Capture time in [`TIMESTAMP_FORMAT`]. `None` means "use append time".
    pub timestamp: Option<String>,
    pub method: String,
    pub url: String,
    pub ip_address: String,
    pub browser: String,
    pub device_type: DeviceType,
    pub referer: String,
    pub status_code: u16,
    pub user_agent: String,
}

/// A single row from the `request_logs` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Auto-incremented row ID; strictly increasing in insertion order.
    pub id: i64,
    /// UTC capture time in [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// Request method, upper-cased.
    pub method: String,
    /// Reconstructed absolute request URL.
    pub url: String,
    /// Best-effort client IP, or `"Unknown"`.
    pub ip_address: String,
    /// Browser label and version, or `"Unknown"`.
    pub browser: String,
    /// Device class.
    pub device_type: DeviceType,
    /// Referring URL, or `"Direct"`.
    pub referer: String,
    /// Response status reported by the host.
    pub status_code: u16,
    /// Raw user agent, or `"Unknown"`.
    pub user_agent: String,
}

/// Formats a UTC instant the way it is stored in the log.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a caller-supplied timestamp.
///
/// Accepts RFC 3339 (any offset, converted to UTC), the on-disk format, or a
/// bare `YYYY-MM-DD` date meaning midnight UTC. Returns `None` otherwise.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
