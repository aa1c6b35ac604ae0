//! Client IP resolution.
//!
//! Candidate sources are checked in trust order: edge/CDN headers first,
//! then generic forwarding chains, then the direct peer. Only routable
//! addresses are accepted from any source, so proxy-internal hops never end
//! up in the log.

use crate::request::RawRequest;
use ipnet::IpNet;
use reqmon_types::UNKNOWN;
use std::net::{IpAddr, SocketAddr};
use std::sync::LazyLock;

/// Headers consulted for the client address, highest trust first.
pub const IP_HEADERS: [&str; 7] = [
    "CF-Connecting-IP",
    "Client-IP",
    "X-Forwarded-For",
    "X-Forwarded",
    "X-Cluster-Client-IP",
    "Forwarded-For",
    "Forwarded",
];

/// Private and reserved ranges that are never accepted as a client address.
const NON_ROUTABLE: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "240.0.0.0/4",
    "::/128",
    "::1/128",
    "::ffff:0:0/96",
    "fc00::/7",
    "fe80::/10",
];

static NON_ROUTABLE_NETS: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    NON_ROUTABLE
        .iter()
        .filter_map(|cidr| {
            cidr.parse()
                .map_err(|e| tracing::warn!(cidr, "invalid non-routable range: {}", e))
                .ok()
        })
        .collect()
});

/// Returns `true` if `ip` lies outside every private and reserved range.
pub fn is_routable(ip: &IpAddr) -> bool {
    !NON_ROUTABLE_NETS.iter().any(|net| net.contains(ip))
}

/// Resolves the best-effort client IP for a request.
///
/// Each header value may be a comma-separated chain; its entries are tried
/// left to right. If nothing routable is found the raw peer address is
/// returned, or `"Unknown"` when there is none.
pub fn resolve_client_ip(request: &RawRequest) -> String {
    let header_values = IP_HEADERS
        .iter()
        .filter_map(|name| request.non_empty_header(name));
    let peer = request.remote_addr.as_deref();

    for value in header_values.chain(peer) {
        if let Some(ip) = first_routable(value) {
            return ip.to_string();
        }
    }

    match peer.map(str::trim).filter(|p| !p.is_empty()) {
        Some(raw) => parse_candidate(raw).map_or_else(|| raw.to_string(), |ip| ip.to_string()),
        None => UNKNOWN.to_string(),
    }
}

fn first_routable(value: &str) -> Option<IpAddr> {
    value
        .split(',')
        .filter_map(parse_candidate)
        .find(is_routable)
}

/// Parses one address token.
///
/// Handles bare addresses, `addr:port`, `[v6]:port`, and RFC 7239 elements
/// such as `for="[2001:db8::1]:4711";proto=https`.
fn parse_candidate(token: &str) -> Option<IpAddr> {
    let mut token = token.trim();

    if token.contains('=') {
        token = token
            .split(';')
            .map(str::trim)
            .find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                key.trim().eq_ignore_ascii_case("for").then_some(value.trim())
            })?;
    }

    let token = token.trim_matches('"');
    if let Ok(ip) = token.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = token.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse().ok())
        .or_else(|| {
            // IPv4 with a port but no brackets, e.g. `198.51.100.7:8080`.
            let (host, port) = token.rsplit_once(':')?;
            port.parse::<u16>().ok()?;
            host.parse::<std::net::Ipv4Addr>().ok().map(IpAddr::V4)
        })
}
