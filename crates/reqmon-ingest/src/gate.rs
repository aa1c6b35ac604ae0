//! Decides whether a request is an anonymous front-end page load.
//!
//! The ingestor itself records whatever it is handed; callers run the gate
//! first so admin screens, sign-in flows, API traffic and signed-in users
//! never reach the log.

use crate::request::RawRequest;
use serde::Serialize;

/// Path prefixes skipped by default: admin, authentication, registration
/// and API routes.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "/admin",
    "/wp-admin",
    "/login",
    "/wp-login.php",
    "/register",
    "/wp-register.php",
    "/api/",
    "/wp-json",
    "/xmlrpc.php",
];

/// Why a request was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The host reported an authenticated session.
    Authenticated,
    /// The request was made by script (`X-Requested-With: XMLHttpRequest`).
    Programmatic,
    /// The path is an admin, auth, or API route.
    ExcludedPath,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authenticated => "authenticated",
            Self::Programmatic => "programmatic",
            Self::ExcludedPath => "excluded_path",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-side filter applied before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureGate {
    excluded_prefixes: Vec<String>,
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_PREFIXES.iter().copied())
    }
}

impl CaptureGate {
    /// Builds a gate with a custom prefix list. Blank entries are dropped.
    pub fn new<I, S>(excluded_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let excluded_prefixes = excluded_prefixes
            .into_iter()
            .map(Into::into)
            .map(|p: String| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { excluded_prefixes }
    }

    pub fn excluded_prefixes(&self) -> &[String] {
        &self.excluded_prefixes
    }

    /// Returns `Ok(())` when the request should be recorded.
    pub fn admit(&self, request: &RawRequest) -> Result<(), SkipReason> {
        if request.authenticated {
            return Err(SkipReason::Authenticated);
        }
        if request
            .header("X-Requested-With")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("XMLHttpRequest"))
        {
            return Err(SkipReason::Programmatic);
        }

        let path = request.path().to_ascii_lowercase();
        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| covers(prefix, &path))
        {
            return Err(SkipReason::ExcludedPath);
        }

        Ok(())
    }
}

/// `/admin` covers `/admin` and `/admin/...` but not `/administrator`.
/// A prefix ending in `/` covers everything below it.
fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_page_load_is_admitted() {
        let gate = CaptureGate::default();
        let req = RawRequest::new("GET", "/blog/hello-world?utm=x");
        assert_eq!(gate.admit(&req), Ok(()));
    }

    #[test]
    fn authenticated_requests_are_skipped() {
        let gate = CaptureGate::default();
        let mut req = RawRequest::new("GET", "/");
        req.authenticated = true;
        assert_eq!(gate.admit(&req), Err(SkipReason::Authenticated));
    }

    #[test]
    fn xhr_requests_are_skipped() {
        let gate = CaptureGate::default();
        let req = RawRequest::new("POST", "/cart").with_header("x-requested-with", "XMLHttpRequest");
        assert_eq!(gate.admit(&req), Err(SkipReason::Programmatic));
    }

    #[test]
    fn admin_auth_and_api_routes_are_skipped() {
        let gate = CaptureGate::default();
        for path in [
            "/wp-admin/admin-ajax.php",
            "/wp-login.php?action=lostpassword",
            "/admin",
            "/Admin/users",
            "/api/v1/items",
            "/wp-json/wp/v2/posts",
            "https://example.com/register",
        ] {
            let req = RawRequest::new("GET", path);
            assert_eq!(
                gate.admit(&req),
                Err(SkipReason::ExcludedPath),
                "{path} should be skipped"
            );
        }
    }

    #[test]
    fn prefix_matching_respects_segment_boundaries() {
        let gate = CaptureGate::default();
        for path in ["/administrator-bio", "/login-help-article", "/apiary"] {
            let req = RawRequest::new("GET", path);
            assert_eq!(gate.admit(&req), Ok(()), "{path} should be admitted");
        }
    }

    #[test]
    fn custom_prefixes_replace_defaults() {
        let gate = CaptureGate::new(["/private/", "  ", "/Staff"]);
        assert_eq!(gate.excluded_prefixes(), ["/private/", "/staff"]);

        assert_eq!(
            gate.admit(&RawRequest::new("GET", "/private/report")),
            Err(SkipReason::ExcludedPath)
        );
        assert_eq!(
            gate.admit(&RawRequest::new("GET", "/staff")),
            Err(SkipReason::ExcludedPath)
        );
        assert_eq!(gate.admit(&RawRequest::new("GET", "/wp-admin")), Ok(()));
    }
}
