//! Vision backend URL validation
//!
//! The backend URL comes from configuration and receives every uploaded
//! photo, so it is checked against SSRF rules before any client is built.

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Environment variable relaxing the rules for local development
pub const DEV_MODE_ENV: &str = "CHECKMETER_DEV_MODE";

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("URL scheme '{0}' is not allowed, only HTTPS is permitted")]
    InvalidScheme(String),

    #[error("Host '{0}' is blocked: internal/private addresses are not allowed")]
    BlockedHost(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Hostnames never accepted as a backend
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
    "metadata.google.internal",
    "metadata.goog",
];

/// Which relaxations apply when validating
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlPolicy {
    pub allow_http: bool,
    pub allow_local: bool,
}

impl UrlPolicy {
    /// Relaxed policy for pointing the service at a local stand-in
    pub fn development() -> Self {
        Self {
            allow_http: true,
            allow_local: true,
        }
    }

    /// Development policy when `CHECKMETER_DEV_MODE` is set, strict otherwise
    pub fn from_env() -> Self {
        if std::env::var_os(DEV_MODE_ENV).is_some() {
            Self::development()
        } else {
            Self::default()
        }
    }
}

/// Validate the vision backend URL.
///
/// HTTPS only; loopback, private and link-local hosts are rejected unless
/// the policy allows local addresses. Link-local (cloud metadata) is always
/// rejected.
pub fn validate_backend_url(raw: &str, policy: UrlPolicy) -> Result<Url, SecurityError> {
    let url = Url::parse(raw)?;

    match url.scheme() {
        "https" => {}
        "http" if policy.allow_http => {}
        scheme => return Err(SecurityError::InvalidScheme(scheme.to_string())),
    }

    let host = url.host_str().ok_or(SecurityError::MissingHost)?;
    let host_lower = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();

    if !policy.allow_local
        && BLOCKED_HOSTNAMES
            .iter()
            .any(|blocked| host_lower == *blocked || host_lower.ends_with(&format!(".{}", blocked)))
    {
        return Err(SecurityError::BlockedHost(host.to_string()));
    }

    if let Ok(ip) = host_lower.parse::<IpAddr>() {
        if is_link_local(&ip) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }
        if !policy.allow_local && (ip.is_loopback() || ip.is_unspecified() || is_private(&ip)) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }
    }

    Ok(url)
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_private()
                // carrier-grade NAT 100.64.0.0/10
                || (octets[0] == 100 && (octets[1] & 0xC0) == 64)
                || octets[0] == 0
        }
        // unique local fc00::/7
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}
