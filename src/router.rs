// src/router.rs

//! Request routing: `Host` header plus request path to a stored entry.
//!
//! The host label names the mirrored authority, the request path and query
//! name the resource. Both are run through the same normalization the crawl
//! used, so `/a%7Eb` and `/a~b` find the same entry.

use std::sync::Arc;

use crate::codec::{self, PathCodec};
use crate::error::{AppError, Result};
use crate::models::{NormalizedTarget, StorageEntry};
use crate::storage::{MirrorStore, SiteInfo};
use crate::utils::split_host_header;

/// Maps incoming requests to store entries.
#[derive(Clone)]
pub struct Router {
    suffix: String,
    codec: PathCodec,
    store: Arc<dyn MirrorStore>,
}

impl Router {
    pub fn new(suffix: &str, codec: PathCodec, store: Arc<dyn MirrorStore>) -> Self {
        Self {
            suffix: codec::normalize_suffix(suffix),
            codec,
            store,
        }
    }

    /// Archive suffix, normalized.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// True when the request is for the archive apex itself.
    pub fn is_archive_root(&self, host_header: &str) -> bool {
        let (host, _) = split_host_header(host_header);
        codec::normalize_suffix(host) == self.suffix
    }

    /// Target and storage key for a request, without touching the store.
    pub fn resolve(
        &self,
        host_header: &str,
        path: &str,
        query: Option<&str>,
    ) -> Result<(NormalizedTarget, String)> {
        let (host, _) = split_host_header(host_header);
        let root = codec::from_label(host, &self.suffix)?;
        let target = root.with_request(path, query)?;
        // Serving must never grow the fold index.
        let key = self.codec.encode(&target)?.key;
        Ok((target, key))
    }

    /// Look up the stored response for a request.
    ///
    /// # Errors
    /// Label errors when the host is not a mirror label,
    /// [`AppError::NotFound`] when nothing is stored, and
    /// [`AppError::PathCollision`] when the entry under the key belongs to
    /// a different URL.
    pub async fn route(
        &self,
        host_header: &str,
        path: &str,
        query: Option<&str>,
    ) -> Result<StorageEntry> {
        let (target, key) = self.resolve(host_header, path, query)?;
        let entry = self.store.get(&key).await?;
        if !entry.is_intact() {
            log::warn!("Entry {key} does not match its recorded hash");
        }

        let url = target.to_url();
        if entry.metadata.url != url {
            return Err(AppError::collision(
                key,
                format!("holds '{}', requested '{}'", entry.metadata.url, url),
            ));
        }
        Ok(entry)
    }

    /// All mirrored sites.
    pub async fn sites(&self) -> Result<Vec<SiteInfo>> {
        self.store.list_sites().await
    }

    /// Host label serving a site.
    pub fn label_for(&self, site: &NormalizedTarget) -> String {
        codec::to_label(site, &self.suffix)
    }
}
