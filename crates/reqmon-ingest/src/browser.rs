//! Browser classification from the user agent.
//!
//! Rules are evaluated top-down and the first match wins. Most engines
//! advertise each other's tokens (Edge and Opera carry `Chrome/` and
//! `Safari/`, Chrome carries `Safari/`), so the more specific products sit
//! above the generic ones.

use regex::Regex;
use reqmon_types::UNKNOWN;
use std::sync::LazyLock;

/// `(label, pattern)` pairs. Each pattern captures the version in group 1.
pub const BROWSER_RULES: &[(&str, &str)] = &[
    ("Edge", r"Edg(?:e|A|iOS)?/([0-9.]+)"),
    ("Opera", r"(?:OPR|Opera)/([0-9.]+)"),
    ("Chrome", r"Chrome/([0-9.]+)"),
    ("Firefox", r"Firefox/([0-9.]+)"),
    ("Safari", r"Safari/([0-9.]+)"),
    ("Internet Explorer", r"MSIE ([0-9.]+)"),
    ("Internet Explorer", r"Trident/.*rv:([0-9.]+)"),
];

static COMPILED_RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    BROWSER_RULES
        .iter()
        .filter_map(|&(label, pattern)| {
            Regex::new(pattern)
                .map(|re| (label, re))
                .map_err(|e| tracing::warn!(label, "invalid browser pattern {:?}: {}", pattern, e))
                .ok()
        })
        .collect()
});

/// Returns `"<label> <version>"` for the first matching rule, or `"Unknown"`.
pub fn classify_browser(user_agent: &str) -> String {
    COMPILED_RULES
        .iter()
        .find_map(|(label, re)| {
            let version = re.captures(user_agent)?.get(1)?.as_str();
            Some(format!("{label} {version}"))
        })
        .unwrap_or_else(|| UNKNOWN.to_string())
}
