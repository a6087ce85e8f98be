//! Shared utility functions for the license server.

use axum::http::HeaderMap;

pub const SECONDS_PER_DAY: i64 = 86400;

/// Unix timestamp `days` from `base`.
pub fn timestamp_after_days(base: i64, days: i64) -> i64 {
    base + days * SECONDS_PER_DAY
}

/// Client identity for rate limiting and audit: first entry of an
/// `x-forwarded-for` chain, else `x-real-ip`, else the direct peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<&str>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.unwrap_or("unknown").to_string()
}

/// User agent, truncated for the activation log.
pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(500).collect())
}

/// Extract a Bearer token from the Authorization header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}
