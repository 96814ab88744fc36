//! Best-effort client identity for quota buckets
//!
//! Clients behind the same proxy share a bucket. This is not an
//! authentication mechanism.

use axum::http::{header, HeaderMap};

/// Cookie carrying a client-chosen identifier
pub const CLIENT_ID_COOKIE: &str = "client-id";

/// Identity used when nothing else is available
pub const UNKNOWN_IDENTITY: &str = "unknown-ip";

/// Derive the quota identity: first `X-Forwarded-For` entry, then the
/// `client-id` cookie, then `X-Real-IP`, then a shared fallback.
pub fn client_identity(headers: &HeaderMap) -> String {
    forwarded_for(headers)
        .or_else(|| client_id_cookie(headers))
        .or_else(|| header_text(headers, "x-real-ip"))
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_text(headers, "x-forwarded-for")?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
}

fn client_id_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CLIENT_ID_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
