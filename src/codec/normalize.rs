// src/codec/normalize.rs

//! URL normalization.
//!
//! Turns any absolute http(s) URL into a [`NormalizedTarget`] so that URLs a
//! browser would treat as the same resource map to the same value. The
//! scheme and host are lowercased, the default port is made explicit, path
//! segments are re-escaped canonically and the query keeps its bytes apart
//! from escape normalization. Userinfo and fragments are dropped.
//!
//! Trailing slashes and path case are significant and left alone.

use std::net::Ipv4Addr;

use url::{Host, Url};

use crate::codec::escape;
use crate::error::{AppError, Result};
use crate::models::{NormalizedTarget, Scheme};
use crate::utils::is_numeric_label;

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

pub use escape::{canonical_path, canonical_query};

/// Normalize a raw URL.
///
/// # Errors
/// [`AppError::InvalidUrl`] when the input is not an absolute http(s) URL
/// with a host, [`AppError::UnsupportedHost`] when the host cannot be
/// carried in a DNS label (IPv6 literals, odd characters).
pub fn normalize(raw: &str) -> Result<NormalizedTarget> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| AppError::invalid_url(raw, e))?;

    let scheme: Scheme = url.scheme().parse().map_err(|_| {
        AppError::invalid_url(raw, format!("scheme '{}' is not http or https", url.scheme()))
    })?;

    let host = match url.host() {
        Some(Host::Domain(domain)) => canonical_host(domain)?,
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => return Err(AppError::UnsupportedHost(format!("[{addr}]"))),
        None => return Err(AppError::invalid_url(raw, "missing host")),
    };

    let port = url.port_or_known_default().unwrap_or(scheme.default_port());
    if port == 0 {
        return Err(AppError::invalid_url(raw, "port must be in 1..=65535"));
    }

    Ok(NormalizedTarget::from_canonical(
        scheme,
        host,
        port,
        canonical_path(url.path()),
        url.query().and_then(canonical_query),
    ))
}

/// Lowercase a DNS name, drop one trailing dot and check that every label
/// fits in a DNS label.
///
/// A name ending in a numeric label is only accepted as a dotted-quad IPv4
/// literal; URL parsers read `10.0.0` as the address `10.0.0.0`.
pub fn canonical_host(host: &str) -> Result<String> {
    let lower = host.trim().to_ascii_lowercase();
    let name = lower.strip_suffix('.').unwrap_or(&lower);

    let ends_numeric = name.rsplit('.').next().is_some_and(is_numeric_label);
    if ends_numeric {
        return match name.parse::<Ipv4Addr>() {
            Ok(addr) if addr.to_string() == name => Ok(name.to_string()),
            _ => Err(AppError::UnsupportedHost(host.to_string())),
        };
    }

    let valid = !name.is_empty()
        && name.len() <= MAX_HOST_LEN
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= MAX_LABEL_LEN
                && label
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
        });

    if valid {
        Ok(name.to_string())
    } else {
        Err(AppError::UnsupportedHost(host.to_string()))
    }
}
