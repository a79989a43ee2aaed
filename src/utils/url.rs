// src/utils/url.rs

//! Host and label helpers shared by the codecs and the server.

/// Split a `Host` header into host and optional port.
///
/// # Examples
/// ```
/// use magicmirror::utils::url::split_host_header;
///
/// assert_eq!(
///     split_host_header("Some.Host.com:8080"),
///     ("Some.Host.com", Some(8080))
/// );
/// assert_eq!(split_host_header("some.host.com"), ("some.host.com", None));
/// ```
pub fn split_host_header(header: &str) -> (&str, Option<u16>) {
    let header = header.trim();
    match header.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && is_numeric_label(port) => {
            (host, port.parse().ok())
        }
        Some((host, "")) => (host, None),
        _ => (header, None),
    }
}

/// True for a non-empty label made only of ASCII digits.
pub fn is_numeric_label(label: &str) -> bool {
    !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit())
}
