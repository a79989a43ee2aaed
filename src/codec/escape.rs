//! Percent-escaping rules.
//!
//! Two layers are involved:
//!
//! - *Canonical* escaping makes equivalent URLs identical. Path segments are
//!   fully decoded and re-encoded with [`SEGMENT`]; queries keep their
//!   existing escapes and only get the hex case and stray `%` fixed.
//! - *Store* escaping makes canonical text safe as a file name on every
//!   supported filesystem. It is applied by the path codec on top of the
//!   canonical form.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, percent_encode};

/// Bytes a canonical path segment keeps encoded. Non-ASCII bytes are always
/// encoded as well.
pub const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'/');

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Append `%XX` for one byte.
pub fn push_escape(out: &mut String, byte: u8) {
    out.push('%');
    out.push(HEX[(byte >> 4) as usize] as char);
    out.push(HEX[(byte & 0x0F) as usize] as char);
}

/// Decode a segment completely and re-encode it canonically.
pub fn canonical_segment(raw: &str) -> String {
    let bytes: Vec<u8> = percent_decode_str(raw).collect();
    encode_segment(&bytes)
}

/// Canonical encoding of decoded segment bytes.
pub fn encode_segment(bytes: &[u8]) -> String {
    match bytes {
        // Dot segments would be resolved away by any URL parser.
        b"." => "%2E".to_string(),
        b".." => "%2E%2E".to_string(),
        _ => percent_encode(bytes, SEGMENT).to_string(),
    }
}

/// Canonical form of an absolute path; empty becomes `/`.
pub fn canonical_path(path: &str) -> String {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let segments: Vec<String> = rest.split('/').map(canonical_segment).collect();
    format!("/{}", segments.join("/"))
}

/// Canonical form of a raw query; `None` when empty.
///
/// Existing escapes are kept (decoding `%26` would turn data into a
/// delimiter) but get uppercase hex. A `%` that does not start an escape
/// becomes `%25`. Bytes a URL parser would encode are encoded.
pub fn canonical_query(query: &str) -> Option<String> {
    if query.is_empty() {
        return None;
    }

    let bytes = query.as_bytes();
    let mut out = String::with_capacity(query.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            match (bytes.get(i + 1), bytes.get(i + 2)) {
                (Some(h), Some(l)) if h.is_ascii_hexdigit() && l.is_ascii_hexdigit() => {
                    out.push('%');
                    out.push(h.to_ascii_uppercase() as char);
                    out.push(l.to_ascii_uppercase() as char);
                    i += 3;
                }
                _ => {
                    out.push_str("%25");
                    i += 1;
                }
            }
            continue;
        }
        if query_needs_escape(b) {
            push_escape(&mut out, b);
        } else {
            out.push(b as char);
        }
        i += 1;
    }
    Some(out)
}

fn query_needs_escape(b: u8) -> bool {
    b < 0x20 || b >= 0x7F || matches!(b, b' ' | b'"' | b'#' | b'<' | b'>' | b'\'')
}

/// Bytes every supported filesystem accepts literally in a name.
pub fn is_store_safe(b: u8) -> bool {
    b.is_ascii_lowercase()
        || b.is_ascii_digit()
        || matches!(
            b,
            b'-' | b'_' | b'.' | b'(' | b')' | b'+' | b',' | b';' | b'=' | b'@' | b'\'' | b'$' | b'&'
        )
}

/// Store-escape a canonical path segment, keeping its `%XX` escapes.
pub fn store_segment(segment: &str, fold_case: bool) -> String {
    store_escape(segment, fold_case, true)
}

/// Store-escape a query exactly: every escape, `%` included, is reversible
/// with a single decode.
pub fn store_query(query: &str, fold_case: bool) -> String {
    store_escape(query, fold_case, false)
}

fn store_escape(text: &str, fold_case: bool, keep_percent: bool) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        // A kept escape travels whole, hex digits included.
        if keep_percent && b == b'%' && starts_escape(&bytes[i..]) {
            out.push_str(&text[i..i + 3]);
            i += 3;
            continue;
        }
        let keep = is_store_safe(b) || (!fold_case && b.is_ascii_uppercase());
        if keep {
            out.push(b as char);
        } else {
            push_escape(&mut out, b);
        }
        i += 1;
    }
    out
}

fn starts_escape(bytes: &[u8]) -> bool {
    matches!(bytes, [b'%', hi, lo, ..] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit())
}

/// Decode a store-escaped query back to its canonical text.
pub fn unstore_query(stored: &str) -> Option<String> {
    percent_decode_str(stored)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

const RESERVED_NAMES: [&str; 24] = [
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9", "conin$",
    "conout$",
];

/// True when Windows would treat the name as a device.
pub fn is_reserved_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_NAMES.iter().any(|r| stem.eq_ignore_ascii_case(r))
}

/// Final per-component fixes: device names get their first byte escaped and
/// a trailing dot is escaped.
pub fn guard_component(mut name: String) -> String {
    if is_reserved_name(&name) {
        let mut escaped = String::with_capacity(name.len() + 2);
        push_escape(&mut escaped, name.as_bytes()[0]);
        escaped.push_str(&name[1..]);
        name = escaped;
    }
    if name.ends_with('.') {
        name.pop();
        name.push_str("%2E");
    }
    name
}
