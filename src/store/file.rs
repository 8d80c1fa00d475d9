use super::ListingStore;
use crate::error::StoreError;
use crate::models::ListingRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One pretty-printed JSON document per listing under a directory.
///
/// File names are the SHA-256 of the external id, so any id is a safe name.
/// Writes go to a temp file that is renamed over the target, which keeps each
/// document either fully old or fully new.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|source| StoreError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    fn document_path(&self, external_id: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(external_id.as_bytes()));
        self.root.join(format!("{}.json", digest))
    }

    async fn write_atomic(&self, external_id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let target = self.document_path(external_id);
        let temp = target.with_extension("json.tmp");

        if let Err(source) = replace_with(&temp, &target, bytes).await {
            // Never leave a half-written temp file behind
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::Io {
                key: external_id.to_string(),
                source,
            });
        }
        debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
        Ok(())
    }
}

/// Write `bytes` to `temp`, flush it to disk, then rename it over `target`
async fn replace_with(temp: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(temp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(temp, target).await
}

#[async_trait]
impl ListingStore for FileStore {
    async fn get(&self, external_id: &str) -> Result<Option<ListingRecord>, StoreError> {
        let path = self.document_path(external_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    key: external_id.to_string(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Serde {
                key: external_id.to_string(),
                source,
            })
    }

    async fn put(&self, record: &ListingRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Serde {
            key: record.external_id.clone(),
            source,
        })?;
        self.write_atomic(&record.external_id, &json).await
    }

    async fn touch(&self, external_id: &str, seen_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let Some(mut record) = self.get(external_id).await? else {
            return Ok(false);
        };
        record.last_seen_at = Some(seen_at);
        self.put(&record).await?;
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str) -> ListingRecord {
        let mut r = ListingRecord::candidate(id);
        r.title = Some("Sahibinden 2+1".to_string());
        r.with_hash()
    }

    #[tokio::test]
    async fn put_then_get_returns_the_document() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        assert!(store.get("42").await.expect("get").is_none());
        store.put(&record("42")).await.expect("put");
        let loaded = store.get("42").await.expect("get").expect("present");
        assert_eq!(loaded, record("42"));
    }

    #[tokio::test]
    async fn ids_with_path_characters_are_safe() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        store.put(&record("../../etc/passwd")).await.expect("put");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).expect("read_dir").collect();
        assert_eq!(entries.len(), 1);
        assert!(store.get("../../etc/passwd").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn touch_only_moves_last_seen() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");
        store.put(&record("7")).await.expect("put");

        let seen = DateTime::parse_from_rfc3339("2026-10-18T06:00:00Z")
            .expect("ts")
            .with_timezone(&Utc);
        assert!(store.touch("7", seen).await.expect("touch"));
        assert!(!store.touch("8", seen).await.expect("touch missing"));

        let loaded = store.get("7").await.expect("get").expect("present");
        assert_eq!(loaded.last_seen_at, Some(seen));
        assert_eq!(loaded.title, record("7").title);
        assert_eq!(loaded.raw_hash, record("7").raw_hash);
    }

    #[tokio::test]
    async fn corrupt_document_is_a_store_error() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");
        std::fs::write(store.document_path("bad"), b"{not json").expect("write");

        assert!(matches!(
            store.get("bad").await,
            Err(StoreError::Serde { .. })
        ));
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_document() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");
        store.put(&record("7")).await.expect("put");

        // A directory squatting on the temp path makes the next write fail
        let temp = store.document_path("7").with_extension("json.tmp");
        std::fs::create_dir(&temp).expect("mkdir");

        let mut changed = record("7");
        changed.title = Some("Fiyat düştü".to_string());
        assert!(matches!(
            store.put(&changed.with_hash()).await,
            Err(StoreError::Io { .. })
        ));
        assert_eq!(store.get("7").await.expect("get"), Some(record("7")));
    }

    #[tokio::test]
    async fn failed_rename_removes_temp_file() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).await.expect("open");

        // A non-empty directory at the target path makes the rename fail
        let target = store.document_path("9");
        std::fs::create_dir(&target).expect("mkdir");
        std::fs::write(target.join("keep"), b"x").expect("write");

        assert!(store.put(&record("9")).await.is_err());
        assert!(!target.with_extension("json.tmp").exists());
    }
}
