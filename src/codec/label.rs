// src/codec/label.rs

//! Mirror host labels.
//!
//! Every mirrored authority is served under its own DNS name inside the
//! archive suffix, `<scheme>.<host>[.<port>].<suffix>`, so relative links
//! in archived pages keep resolving against the mirror:
//!
//! - `http://example.com/` is served as `http.example.com.<suffix>`
//! - `https://other.site.com:444/` as `https.other.site.com.444.<suffix>`
//!
//! The port is left out when it is the scheme default, except for IPv4
//! hosts whose last octet would otherwise be read as a port.
//!
//! A label is only resolvable while the whole name stays within 253 bytes,
//! so long hosts under a long suffix may not be reachable by name.

use crate::error::{AppError, Result};
use crate::models::{NormalizedTarget, Scheme};
use crate::utils::is_numeric_label;

/// Lowercase a suffix and trim surrounding dots.
pub fn normalize_suffix(suffix: &str) -> String {
    suffix.trim().trim_matches('.').to_ascii_lowercase()
}

/// Host name that serves `target`'s authority under `suffix`.
///
/// Names over the DNS limit are still returned, with a warning.
pub fn to_label(target: &NormalizedTarget, suffix: &str) -> String {
    let mut label = format!("{}.{}", target.scheme(), target.host());
    if needs_port(target) {
        label.push('.');
        label.push_str(&target.port().to_string());
    }
    label.push('.');
    label.push_str(&normalize_suffix(suffix));
    if !fits_dns(&label) {
        log::warn!(
            "Mirror name for {} is {} bytes, over the DNS limit of {MAX_NAME_LEN}",
            target.origin(),
            label.len()
        );
    }
    label
}

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// True when `name` can be resolved: at most 253 bytes, labels of 1 to 63.
pub fn fits_dns(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN
        && name
            .split('.')
            .all(|label| !label.is_empty() && label.len() <= MAX_LABEL_LEN)
}

fn needs_port(target: &NormalizedTarget) -> bool {
    !target.is_default_port()
        || target
            .host()
            .rsplit('.')
            .next()
            .is_some_and(is_numeric_label)
}

/// Decode a host name under `suffix` back to the root of its authority.
///
/// The port in the `Host` header, if any, must already be stripped.
///
/// # Errors
/// - [`AppError::UnknownArchive`] when the host is not under `suffix`
/// - [`AppError::MalformedLabel`] when the labels are not
///   `<scheme>.<host>[.<port>]`
/// - [`AppError::AmbiguousLabel`] when a single numeric token follows the
///   scheme
pub fn from_label(host: &str, suffix: &str) -> Result<NormalizedTarget> {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    let suffix = normalize_suffix(suffix);

    let labels = host
        .strip_suffix(suffix.as_str())
        .filter(|_| !suffix.is_empty())
        .and_then(|rest| rest.strip_suffix('.'))
        .ok_or_else(|| AppError::UnknownArchive {
            host: host.clone(),
            suffix: suffix.clone(),
        })?;

    let tokens: Vec<&str> = labels.split('.').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(AppError::malformed_label(&host, "empty label"));
    }

    let (scheme_token, rest) = tokens
        .split_first()
        .ok_or_else(|| AppError::malformed_label(&host, "missing scheme"))?;
    let scheme: Scheme = scheme_token.parse().map_err(|_| {
        AppError::malformed_label(&host, format!("'{scheme_token}' is not a scheme"))
    })?;

    let (host_labels, port) = match rest.split_last() {
        None => return Err(AppError::malformed_label(&host, "missing host")),
        Some((last, [])) if is_numeric_label(last) => {
            return Err(AppError::AmbiguousLabel(host.clone()));
        }
        Some((last, labels)) if is_numeric_label(last) => {
            let port = last
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| AppError::malformed_label(&host, format!("bad port '{last}'")))?;
            (labels, port)
        }
        Some(_) => (rest, scheme.default_port()),
    };

    NormalizedTarget::root(scheme, &host_labels.join("."), port)
        .map_err(|e| AppError::malformed_label(&host, e))
}
