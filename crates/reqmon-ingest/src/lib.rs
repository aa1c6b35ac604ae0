//! Request classification for the reqmon request log.
//!
//! Turns a [`RawRequest`] supplied by the hosting environment into a
//! [`NewLogRecord`]: the client IP is resolved through a trust-ordered list
//! of headers, the user agent is mapped to a browser label and a device
//! class, and absent headers fall back to documented placeholders.
//!
//! Classification is pure. The [`CaptureGate`] is a separate, caller-side
//! check that decides whether a request should be recorded at all.
//!
//! ```rust,ignore
//! use reqmon_ingest::{classify, CaptureGate, RawRequest};
//!
//! let request = RawRequest::new("GET", "/pricing")
//!     .with_header("Host", "example.com")
//!     .with_header("X-Forwarded-For", "10.0.0.1, 203.0.113.5");
//!
//! if CaptureGate::default().admit(&request).is_ok() {
//!     let record = classify(&request)?;
//!     assert_eq!(record.ip_address, "203.0.113.5");
//! }
//! ```

mod browser;
mod device;
mod error;
mod gate;
mod ip;
mod request;

pub use browser::{classify_browser, BROWSER_RULES};
pub use device::classify_device;
pub use error::IngestError;
pub use gate::{CaptureGate, SkipReason, DEFAULT_EXCLUDED_PREFIXES};
pub use ip::{is_routable, resolve_client_ip, IP_HEADERS};
pub use request::RawRequest;

use reqmon_types::{
    format_timestamp, NewLogRecord, DEFAULT_STATUS_CODE, DIRECT_REFERER, UNKNOWN,
};

/// Longest method token accepted.
const MAX_METHOD_LEN: usize = 16;

/// Classifies one request into a log record.
///
/// # Errors
///
/// Returns `IngestError::InvalidRequest` when the method is empty or not an
/// HTTP token, or when the target is empty. Header problems never fail.
pub fn classify(request: &RawRequest) -> Result<NewLogRecord, IngestError> {
    let method = normalize_method(&request.method)?;
    if request.uri.trim().is_empty() {
        return Err(IngestError::InvalidRequest("empty request target".to_string()));
    }

    let user_agent = request.non_empty_header("User-Agent");
    let browser = user_agent.map_or_else(|| UNKNOWN.to_string(), classify_browser);
    let device_type = classify_device(user_agent.unwrap_or_default());

    let referer = request
        .non_empty_header("Referer")
        .unwrap_or(DIRECT_REFERER)
        .to_string();

    let status_code = request
        .status_code
        .filter(|code| *code != 0)
        .unwrap_or(DEFAULT_STATUS_CODE);

    Ok(NewLogRecord {
        timestamp: request.timestamp.map(format_timestamp),
        method,
        url: request.url(),
        ip_address: resolve_client_ip(request),
        browser,
        device_type,
        referer,
        status_code,
        user_agent: user_agent.unwrap_or(UNKNOWN).to_string(),
    })
}

fn normalize_method(method: &str) -> Result<String, IngestError> {
    let method = method.trim();
    let is_token = !method.is_empty()
        && method.len() <= MAX_METHOD_LEN
        && method
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !is_token {
        return Err(IngestError::InvalidRequest(format!(
            "invalid method: {method:?}"
        )));
    }
    Ok(method.to_ascii_uppercase())
}
