// src/models/mod.rs

//! Domain models for the mirror.
//!
//! This module contains the data structures shared by the codecs, the store
//! and the router, organized by their primary purpose.

mod config;
mod entry;
mod target;

// Re-export all public types
pub use config::{ArchiveConfig, Config, CrawlerConfig, DiscoveryMode, LoggingConfig, StoreConfig};
pub use entry::{EntryMetadata, FetchResult, StorageEntry};
pub use target::{NormalizedTarget, Scheme};
