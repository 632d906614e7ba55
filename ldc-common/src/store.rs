//! Blob store abstraction
//!
//! Every artifact the pipeline produces (downloaded media, canonical WAVs, segments, CSV
//! tables) is addressed by a relative key such as `datasets/songs/ampar_ampar_pisang.mp3`.
//! Existence of a key is what makes a stage idempotent, so all existence checks go through
//! this trait. Two backends are provided:
//!
//! - [`LocalStore`]: files under a root folder, atomic temp-then-rename writes
//! - [`MemoryStore`]: a map behind a lock, for tests

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

/// Key-value blob storage used by every pipeline stage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Verify the backend is usable (root exists and is writable, bucket reachable, ...)
    ///
    /// Failure here is fatal for a run: nothing could be persisted.
    async fn ensure_ready(&self) -> Result<()>;

    /// Check whether a blob exists under `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Read the full blob stored under `key`
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `bytes` under `key`, replacing any previous blob
    ///
    /// Readers never observe a partially written blob.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Delete the blob under `key` (no-op if absent)
    async fn remove(&self, key: &str) -> Result<()>;

    /// Human-readable location of `key`, for log lines
    fn location(&self, key: &str) -> String;
}

/// Reject keys that are empty, absolute or climb out of the store root
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey {
            key: key.to_string(),
            reason: "empty key",
        });
    }

    let path = Path::new(key);
    for component in path.components() {
        match component {
            Component::Normal(_) => {}
            _ => {
                return Err(Error::InvalidKey {
                    key: key.to_string(),
                    reason: "must be a plain relative path",
                })
            }
        }
    }

    Ok(())
}

// ============================================================================
// Local filesystem backend
// ============================================================================

/// Filesystem-backed store rooted at a folder
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create store rooted at `root` (created lazily by [`BlobStore::ensure_ready`])
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root folder of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn ensure_ready(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            Error::StoreUnavailable(format!(
                "cannot create store root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{}: {}", self.root.display(), e)))?;
        if !metadata.is_dir() {
            return Err(Error::StoreUnavailable(format!(
                "store root is not a directory: {}",
                self.root.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(Error::StoreUnavailable(format!(
                "store root is read-only: {}",
                self.root.display()
            )));
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        tokio::fs::try_exists(&path).await.map_err(Error::blob_io(key))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::MissingBlob(key.to_string())),
            Err(e) => Err(Error::blob_io(key)(e)),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(Error::blob_io(key))?;
        }

        // Temp file lives next to the target so the rename stays on one filesystem
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidKey {
                key: key.to_string(),
                reason: "no file name",
            })?;
        let temp_path = path.with_file_name(format!(".{}.{}.part", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&temp_path, bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::blob_io(key)(e));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::blob_io(key)(e));
        }

        tracing::trace!(path = %path.display(), bytes = bytes.len(), "Wrote blob");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::blob_io(key)(e)),
        }
    }

    fn location(&self, key: &str) -> String {
        self.root.join(key).display().to_string()
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory store (tests, dry runs)
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently stored, in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.blobs
            .read()
            .map(|blobs| blobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn poisoned() -> Error {
        Error::StoreUnavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn ensure_ready(&self) -> Result<()> {
        self.blobs.read().map(|_| ()).map_err(|_| Self::poisoned())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        Ok(blobs.contains_key(key))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;
        let blobs = self.blobs.read().map_err(|_| Self::poisoned())?;
        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| Error::MissingBlob(key.to_string()))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().map_err(|_| Self::poisoned())?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let mut blobs = self.blobs.write().map_err(|_| Self::poisoned())?;
        blobs.remove(key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
