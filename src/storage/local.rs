//! Local filesystem storage implementation.
//!
//! Each entry is one file: a single line of JSON metadata, a newline, then
//! the body bytes. Writes go to a temporary file in the target directory
//! and are renamed into place, so readers see either the old entry or the
//! new one.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::codec::decode_authority;
use crate::codec::path::PORT_MARKER;
use crate::error::{AppError, Result};
use crate::models::{EntryMetadata, StorageEntry};
use crate::storage::{MirrorStore, SiteInfo};

/// File holding the fold index, relative to the database root.
pub const FOLD_INDEX_FILE: &str = "folds.json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct FoldFile {
    version: u32,
    folds: BTreeMap<String, String>,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a key, refusing keys that would leave the root.
    fn path(&self, key: &str) -> Result<PathBuf> {
        let escapes = key.is_empty()
            || key.starts_with('/')
            || key.contains('\\')
            || key.split('/').any(|c| c.is_empty() || c == "." || c == "..");
        if escapes {
            return Err(AppError::ambiguous_path(key, "not a relative store key"));
        }
        Ok(self.root_dir.join(key))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().unwrap_or(&self.root_dir);
        tokio::fs::create_dir_all(parent).await?;

        // Unique per process and call, short enough for any name limit.
        let tmp = parent.join(format!(
            ".tmp-{}-{}",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, path).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    /// Read bytes, returning None if nothing is stored there.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read only the metadata line of an entry.
    async fn read_metadata(&self, path: &Path) -> Result<Option<EntryMetadata>> {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if is_missing(&e) => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        let mut line = Vec::new();
        match BufReader::new(file).read_until(b'\n', &mut line).await {
            Ok(_) => Ok(Some(serde_json::from_slice(trim_newline(&line))?)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Serialize an entry into its on-disk form.
fn encode_entry(entry: &StorageEntry) -> Result<Vec<u8>> {
    // Compact JSON escapes newlines inside strings, so the first '\n'
    // always ends the metadata.
    let mut bytes = serde_json::to_vec(&entry.metadata)?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&entry.body);
    Ok(bytes)
}

fn decode_entry(key: &str, bytes: &[u8]) -> Result<StorageEntry> {
    let split = bytes
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| AppError::validation(format!("entry '{key}' has no metadata line")))?;
    Ok(StorageEntry {
        metadata: serde_json::from_slice(&bytes[..split])?,
        body: bytes[split + 1..].to_vec(),
    })
}

fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

fn is_missing(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::NotFound | ErrorKind::IsADirectory | ErrorKind::NotADirectory
    )
}

/// Modification time of the newest file below `dir`.
fn newest_write(dir: &Path) -> std::io::Result<Option<SystemTime>> {
    let mut newest = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let modified = if file_type.is_dir() {
            newest_write(&entry.path())?
        } else {
            Some(entry.metadata()?.modified()?)
        };
        newest = newest.max(modified);
    }
    Ok(newest)
}

/// Walk `<scheme>/<labels...>/@<port>` directories.
fn collect_sites(root: &Path) -> std::io::Result<Vec<SiteInfo>> {
    fn walk(
        dir: &Path,
        parts: &mut Vec<String>,
        out: &mut Vec<SiteInfo>,
    ) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_port = name.starts_with(PORT_MARKER);
            parts.push(name);
            if is_port {
                let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
                match decode_authority(&refs) {
                    Ok(root) => out.push(SiteInfo {
                        root,
                        updated: newest_write(&entry.path())?.map(DateTime::<Utc>::from),
                    }),
                    Err(e) => log::debug!("Skipping {:?}: {}", entry.path(), e),
                }
            } else {
                walk(&entry.path(), parts, out)?;
            }
            parts.pop();
        }
        Ok(())
    }

    let mut sites = Vec::new();
    for scheme in ["http", "https"] {
        let dir = root.join(scheme);
        if dir.is_dir() {
            walk(&dir, &mut vec![scheme.to_string()], &mut sites)?;
        }
    }
    sites.sort_by(|a, b| a.root.cmp(&b.root));
    Ok(sites)
}

#[async_trait]
impl MirrorStore for LocalStore {
    async fn get(&self, key: &str) -> Result<StorageEntry> {
        let path = self.path(key)?;
        match self.read_bytes(&path).await? {
            Some(bytes) => decode_entry(key, &bytes),
            None => Err(AppError::NotFound(key.to_string())),
        }
    }

    async fn put(&self, key: &str, entry: &StorageEntry) -> Result<()> {
        let path = self.path(key)?;

        if let Some(existing) = self.read_metadata(&path).await? {
            if existing.url != entry.metadata.url {
                return Err(AppError::collision(
                    key,
                    format!(
                        "holds '{}', refusing '{}'",
                        existing.url, entry.metadata.url
                    ),
                ));
            }
        }

        let bytes = encode_entry(entry)?;
        self.write_bytes(&path, &bytes)
            .await
            .map_err(|e| AppError::write(key, e))?;
        log::debug!("Stored {} ({} bytes)", key, entry.body.len());
        Ok(())
    }

    async fn list_sites(&self) -> Result<Vec<SiteInfo>> {
        let root = self.root_dir.clone();
        let sites = tokio::task::spawn_blocking(move || collect_sites(&root))
            .await
            .map_err(|e| AppError::validation(format!("site listing task failed: {e}")))??;
        Ok(sites)
    }

    async fn load_folds(&self) -> Result<BTreeMap<String, String>> {
        match self.read_bytes(&self.root_dir.join(FOLD_INDEX_FILE)).await? {
            Some(bytes) => {
                let file: FoldFile = serde_json::from_slice(&bytes)?;
                Ok(file.folds)
            }
            None => Ok(BTreeMap::new()),
        }
    }

    async fn save_folds(&self, folds: &BTreeMap<String, String>) -> Result<()> {
        let file = FoldFile {
            version: 1,
            folds: folds.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        self.write_bytes(&self.root_dir.join(FOLD_INDEX_FILE), &bytes)
            .await
            .map_err(|e| AppError::write(FOLD_INDEX_FILE, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{PathCodec, normalize};
    use crate::models::StoreConfig;
    use tempfile::TempDir;

    fn entry(url: &str, body: &[u8]) -> StorageEntry {
        let target = normalize(url).unwrap();
        StorageEntry::new(
            &target,
            200,
            vec![("Content-Type".into(), "text/html".into())],
            body.to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let entry = entry("http://example.com/index.html", b"<h1>hi</h1>\nline two");

        store
            .put("http/com/example/@default/index.html!", &entry)
            .await
            .unwrap();
        let loaded = store
            .get("http/com/example/@default/index.html!")
            .await
            .unwrap();

        assert_eq!(loaded, entry);
        assert!(loaded.is_intact());
        assert!(tmp.path().join("http/com/example/@default/index.html!").is_file());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        assert!(matches!(
            store.get("http/com/example/@default/nope!").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_directory_is_missing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put("http/com/example/@default/a/!", &entry("http://example.com/a/", b"x"))
            .await
            .unwrap();

        assert!(matches!(
            store.get("http/com/example/@default/a").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_put_replaces_same_url() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let key = "http/com/example/@default/!";

        store.put(key, &entry("http://example.com/", b"old")).await.unwrap();
        store.put(key, &entry("http://example.com/", b"new")).await.unwrap();

        assert_eq!(store.get(key).await.unwrap().body, b"new");
    }

    #[tokio::test]
    async fn test_put_refuses_other_url() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let key = "http/com/example/@default/!";

        store.put(key, &entry("http://example.com/", b"a")).await.unwrap();
        let result = store.put(key, &entry("http://example.com/other", b"b")).await;

        assert!(matches!(result, Err(AppError::PathCollision { .. })));
        assert_eq!(store.get(key).await.unwrap().body, b"a");
    }

    #[tokio::test]
    async fn test_no_temp_files_left() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store
            .put("http/com/example/@default/!", &entry("http://example.com/", b"x"))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path().join("http/com/example/@default"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["!".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        for key in ["../outside!", "/abs!", "a//b!", ""] {
            assert!(store.get(key).await.is_err(), "{key}");
        }
    }

    #[tokio::test]
    async fn test_list_sites() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let codec = PathCodec::new(&StoreConfig::default());

        for url in [
            "http://example.com/",
            "http://example.com/a/b",
            "https://other.site.com:444/a/?x=1",
        ] {
            let target = normalize(url).unwrap();
            let key = codec.to_path(&target).unwrap();
            store.put(&key, &entry(url, b"x")).await.unwrap();
        }

        let sites: Vec<String> = store
            .list_sites()
            .await
            .unwrap()
            .iter()
            .map(|s| s.root.to_url())
            .collect();
        assert_eq!(
            sites,
            vec!["http://example.com/", "https://other.site.com:444/"]
        );
    }

    #[tokio::test]
    async fn test_list_sites_reports_last_write() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        let before = Utc::now() - chrono::Duration::seconds(5);
        store
            .put("http/com/example/@default/a/b!", &entry("http://example.com/a/b", b"x"))
            .await
            .unwrap();

        let sites = store.list_sites().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert!(sites[0].updated.is_some_and(|t| t >= before));
    }

    #[tokio::test]
    async fn test_list_sites_empty_root() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path().join("missing"));
        assert!(store.list_sites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_folds_save_load() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(store.load_folds().await.unwrap().is_empty());

        let mut folds = BTreeMap::new();
        folds.insert("abc~0123".to_string(), "abcdef/ghi!".to_string());
        store.save_folds(&folds).await.unwrap();

        assert_eq!(store.load_folds().await.unwrap(), folds);
        assert!(tmp.path().join(FOLD_INDEX_FILE).is_file());
    }
}
