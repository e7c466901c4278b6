//! Source address allowlisting.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use ipnet::IpNet;

pub const HEADER_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Check a remote address against a client's allowlist.
///
/// Entries are IP literals (exact match) or CIDR blocks (containment).
/// Malformed entries are skipped. An empty allowlist admits everyone.
pub fn ip_allowed(remote: &str, allowlist: &[String]) -> bool {
    if allowlist.is_empty() {
        return true;
    }

    let Ok(ip) = remote.trim().parse::<IpAddr>() else {
        return false;
    };
    let ip = ip.to_canonical();

    allowlist.iter().any(|entry| {
        let entry = entry.trim();
        if entry.is_empty() {
            return false;
        }
        if entry.contains('/') {
            match entry.parse::<IpNet>() {
                Ok(net) => net.contains(&ip),
                Err(_) => {
                    tracing::debug!(entry, "Skipping malformed CIDR allowlist entry");
                    false
                }
            }
        } else {
            match entry.parse::<IpAddr>() {
                Ok(allowed) => allowed.to_canonical() == ip,
                Err(_) => {
                    tracing::debug!(entry, "Skipping malformed IP allowlist entry");
                    false
                }
            }
        }
    })
}

/// Determine the caller's address.
///
/// When `X-Forwarded-For` is present its first hop is the caller, even if
/// that hop is blank or unreadable. A blank hop is then denied by any
/// non-empty allowlist rather than falling back to the peer. Without the
/// header the transport peer is used. Trusting the header assumes a single
/// trusted reverse proxy in front of the gateway.
pub fn remote_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    match headers.get(HEADER_FORWARDED_FOR) {
        Some(value) => {
            let hop = value
                .to_str()
                .ok()
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .unwrap_or("");
            Some(hop.to_string())
        }
        None => peer.map(|addr| addr.ip().to_string()),
    }
}
