//! Storage abstractions for mirrored responses.
//!
//! Entries are addressed by the keys [`PathCodec`](crate::codec::PathCodec)
//! produces. Next to the entries a store keeps the fold index needed to
//! decode folded keys.
//!
//! ## Directory Structure (LocalStore)
//!
//! ```text
//! {db}/
//! ├── config.toml                 # Optional configuration
//! ├── folds.json                  # Fold token -> original key text
//! └── http/
//!     └── com/
//!         └── example/
//!             └── @default/
//!                 ├── !           # http://example.com/
//!                 ├── index.html! # http://example.com/index.html
//!                 └── a/
//!                     └── !x=1    # http://example.com/a/?x=1
//! ```

pub mod local;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{NormalizedTarget, StorageEntry};

pub use local::LocalStore;
pub use memory::MemoryStore;

/// A mirrored authority and when it was last written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    /// Root of the authority, path `/`
    pub root: NormalizedTarget,

    /// Newest entry under the authority, if known
    pub updated: Option<DateTime<Utc>>,
}

/// Trait for mirror storage backends.
///
/// Implementations must be safe to share across request handlers and crawl
/// tasks; a reader never observes a partially written entry.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Read the entry stored under `key`.
    ///
    /// Returns [`AppError::NotFound`](crate::error::AppError::NotFound) when
    /// nothing is stored there.
    async fn get(&self, key: &str) -> Result<StorageEntry>;

    /// Store an entry, replacing any entry for the same URL.
    ///
    /// Refuses with a path collision when the key already holds an entry
    /// for a different URL.
    async fn put(&self, key: &str, entry: &StorageEntry) -> Result<()>;

    /// Every mirrored authority, sorted by root.
    async fn list_sites(&self) -> Result<Vec<SiteInfo>>;

    /// Persisted fold index entries; empty when none were saved.
    async fn load_folds(&self) -> Result<BTreeMap<String, String>>;

    /// Replace the persisted fold index.
    async fn save_folds(&self, folds: &BTreeMap<String, String>) -> Result<()>;
}
