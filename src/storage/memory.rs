//! In-memory storage backend for tests and dry runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::codec::decode_authority;
use crate::codec::path::PORT_MARKER;
use crate::error::{AppError, Result};
use crate::models::{NormalizedTarget, StorageEntry};
use crate::storage::{MirrorStore, SiteInfo};

/// Store that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StorageEntry>>,
    folds: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// All keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl MirrorStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<StorageEntry> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, entry: &StorageEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            if existing.metadata.url != entry.metadata.url {
                return Err(AppError::collision(
                    key,
                    format!(
                        "holds '{}', refusing '{}'",
                        existing.metadata.url, entry.metadata.url
                    ),
                ));
            }
        }
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn list_sites(&self) -> Result<Vec<SiteInfo>> {
        let entries = self.entries.read().await;
        let mut sites: BTreeMap<NormalizedTarget, DateTime<Utc>> = BTreeMap::new();
        for (key, entry) in entries.iter() {
            let parts: Vec<&str> = key.split('/').collect();
            let Some(port_at) = parts.iter().position(|p| p.starts_with(PORT_MARKER)) else {
                continue;
            };
            if let Ok(root) = decode_authority(&parts[..=port_at]) {
                let fetched = entry.metadata.fetched_at;
                sites
                    .entry(root)
                    .and_modify(|t| *t = (*t).max(fetched))
                    .or_insert(fetched);
            }
        }
        Ok(sites
            .into_iter()
            .map(|(root, updated)| SiteInfo {
                root,
                updated: Some(updated),
            })
            .collect())
    }

    async fn load_folds(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.folds.read().await.clone())
    }

    async fn save_folds(&self, folds: &BTreeMap<String, String>) -> Result<()> {
        *self.folds.write().await = folds.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::normalize;

    fn entry(url: &str) -> StorageEntry {
        StorageEntry::new(&normalize(url).unwrap(), 200, Vec::new(), url.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn put_get_and_collision() {
        let store = MemoryStore::new();
        let key = "http/com/example/@default/!";

        assert!(matches!(store.get(key).await, Err(AppError::NotFound(_))));
        store.put(key, &entry("http://example.com/")).await.unwrap();
        assert_eq!(store.get(key).await.unwrap().body, b"http://example.com/");

        assert!(matches!(
            store.put(key, &entry("http://example.com/x")).await,
            Err(AppError::PathCollision { .. })
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn list_sites_dedups_authorities() {
        let store = MemoryStore::new();
        store
            .put("http/com/example/@default/!", &entry("http://example.com/"))
            .await
            .unwrap();
        store
            .put("http/com/example/@default/a!", &entry("http://example.com/a"))
            .await
            .unwrap();
        store
            .put("http/com/example/@8080/!", &entry("http://example.com:8080/"))
            .await
            .unwrap();

        let sites: Vec<String> = store
            .list_sites()
            .await
            .unwrap()
            .iter()
            .map(|s| s.root.to_url())
            .collect();
        assert_eq!(sites, vec!["http://example.com/", "http://example.com:8080/"]);
    }

    #[tokio::test]
    async fn list_sites_reports_newest_fetch() {
        let store = MemoryStore::new();
        let mut old = entry("http://example.com/");
        old.metadata.fetched_at = "2020-01-01T00:00:00Z".parse().unwrap();
        let mut new = entry("http://example.com/a");
        new.metadata.fetched_at = "2021-06-01T12:00:00Z".parse().unwrap();
        store.put("http/com/example/@default/!", &old).await.unwrap();
        store.put("http/com/example/@default/a!", &new).await.unwrap();

        let sites = store.list_sites().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].updated, Some(new.metadata.fetched_at));
    }
}
