// src/services/mirror.rs

//! Writing fetched responses into the store.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::{PathCodec, normalize};
use crate::error::Result;
use crate::models::{CrawlerConfig, FetchResult, StorageEntry};
use crate::storage::MirrorStore;

/// Normalizes fetch results, keys them and stores them with retries.
#[derive(Clone)]
pub struct MirrorWriter {
    codec: PathCodec,
    store: Arc<dyn MirrorStore>,
    retries: u32,
    retry_delay: Duration,
}

impl MirrorWriter {
    pub fn new(codec: PathCodec, store: Arc<dyn MirrorStore>, config: &CrawlerConfig) -> Self {
        Self {
            codec,
            store,
            retries: config.write_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn codec(&self) -> &PathCodec {
        &self.codec
    }

    /// Store one fetch result. Returns the key it was stored under.
    pub async fn ingest(&self, fetch: FetchResult) -> Result<String> {
        let target = normalize(&fetch.url)?;
        let encoded = self.codec.encode(&target)?;
        let entry = StorageEntry::from_fetch(&target, fetch);

        self.put_with_retry(&encoded.key, &entry).await?;

        if self.codec.register(&encoded.folds)? {
            let folds = self.codec.index().snapshot();
            if let Err(e) = self.store.save_folds(&folds).await {
                // Kept in memory; the next successful save persists it.
                log::warn!("Failed to persist fold index: {e}");
            }
        }
        Ok(encoded.key)
    }

    async fn put_with_retry(&self, key: &str, entry: &StorageEntry) -> Result<()> {
        let mut attempt = 0;
        loop {
            match self.store.put(key, entry).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!(
                        "Write to {} failed (attempt {}/{}): {}",
                        key,
                        attempt,
                        self.retries + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
