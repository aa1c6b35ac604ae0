//! The raw request descriptor handed over by the hosting environment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One inbound request, as seen by the host that served it.
///
/// Hosts build this from whatever request object they have; nothing in the
/// ingestor reads ambient process state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Origin-form target (`/path?query`) or an absolute URL.
    pub uri: String,
    /// `http` or `https`. Ignored when `uri` is absolute.
    pub scheme: Option<String>,
    /// Authority the request was addressed to. Falls back to the `Host` header.
    pub host: Option<String>,
    /// Request headers. Lookups are case-insensitive.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Address of the directly connected peer.
    pub remote_addr: Option<String>,
    /// Status code of the response the host sent.
    pub status_code: Option<u16>,
    /// Capture time. `None` means the store stamps it on append.
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the host had an authenticated session for this request.
    #[serde(default)]
    pub authenticated: bool,
}

impl RawRequest {
    /// Creates a descriptor with just a method and target.
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Adds a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Sets the directly connected peer address.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns a header value that is present and not blank, trimmed.
    pub fn non_empty_header(&self, name: &str) -> Option<&str> {
        self.header(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Reconstructs the absolute URL of the request.
    pub fn url(&self) -> String {
        let uri = self.uri.trim();
        if is_absolute(uri) {
            return uri.to_string();
        }

        let scheme = self
            .scheme
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("http");
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .or_else(|| self.non_empty_header("Host"))
            .unwrap_or("localhost");

        if uri.starts_with('/') {
            format!("{scheme}://{host}{uri}")
        } else {
            format!("{scheme}://{host}/{uri}")
        }
    }

    /// Path component of the target, without query or fragment.
    pub fn path(&self) -> &str {
        let mut target = self.uri.trim();
        if is_absolute(target) {
            let after_scheme = target.find("://").map_or(target, |i| &target[i + 3..]);
            target = after_scheme
                .find('/')
                .map_or("/", |i| &after_scheme[i..]);
        }
        let end = target.find(['?', '#']).unwrap_or(target.len());
        &target[..end]
    }
}

fn is_absolute(uri: &str) -> bool {
    let lower = uri.get(..8).unwrap_or(uri).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
