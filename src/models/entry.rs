//! Stored responses and the fetch results they are built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::NormalizedTarget;
use crate::utils::sha256_hex;

/// A response as handed over by a fetcher, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// URL the response was fetched for
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Response headers in arrival order
    pub headers: Vec<(String, String)>,

    /// Response body, already content-decoded
    pub body: Vec<u8>,
}

impl FetchResult {
    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Everything about a stored response except the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Normalized URL the entry was fetched for
    pub url: String,

    /// HTTP status of the original response
    pub status: u16,

    /// Content-Type of the original response
    #[serde(default)]
    pub content_type: Option<String>,

    /// Snapshot of the original response headers
    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// When the response was fetched
    pub fetched_at: DateTime<Utc>,

    /// Body length in bytes
    pub content_length: usize,

    /// Hex SHA-256 of the body
    pub content_hash: String,
}

/// A stored response: metadata plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub metadata: EntryMetadata,
    pub body: Vec<u8>,
}

impl StorageEntry {
    /// Build an entry for `target`, stamped with the current time.
    pub fn new(
        target: &NormalizedTarget,
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        let content_type = find_header(&headers, "content-type").map(str::to_string);
        Self {
            metadata: EntryMetadata {
                url: target.to_url(),
                status,
                content_type,
                headers,
                fetched_at: Utc::now(),
                content_length: body.len(),
                content_hash: sha256_hex(&body),
            },
            body,
        }
    }

    /// Build an entry from a fetch result already normalized to `target`.
    pub fn from_fetch(target: &NormalizedTarget, fetch: FetchResult) -> Self {
        Self::new(target, fetch.status, fetch.headers, fetch.body)
    }

    /// True when the body still matches the recorded length and hash.
    pub fn is_intact(&self) -> bool {
        self.body.len() == self.metadata.content_length
            && sha256_hex(&self.body) == self.metadata.content_hash
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
