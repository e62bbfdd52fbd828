pub mod jwt;

use http::HeaderMap;
use std::net::SocketAddr;

/// Best-effort client IP for the anonymous rate-limit bucket: the first
/// hop of `X-Forwarded-For` when present (typical behind a reverse proxy),
/// else the TCP peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}
