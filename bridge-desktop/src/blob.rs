//! Filesystem Blob Store using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::BlobStore,
};
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Blob store rooted at a local directory
///
/// Each key maps to `{root}/{key}`. Writes go to a temporary sibling file and
/// are renamed into place, so a reader never observes a half-written object
/// and a repeated write of the same key simply replaces it.
pub struct TokioBlobStore {
    root: PathBuf,
}

impl TokioBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            BridgeError::Storage(format!(
                "Failed to create blob directory {}: {}",
                root.display(),
                e
            ))
        })?;
        debug!(path = ?root, "Initialized blob store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the root, rejecting traversal.
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(BridgeError::InvalidKey("Blob key is empty".to_string()));
        }

        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(BridgeError::InvalidKey(format!(
                "Blob key resolves outside the store: {}",
                key
            )));
        }

        Ok(self.root.join(relative))
    }

    async fn write_and_rename(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(tmp, path).await
    }
}

#[async_trait]
impl BlobStore for TokioBlobStore {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_file_name(format!(".{}.tmp", Uuid::new_v4()));
        if let Err(e) = Self::write_and_rename(&tmp, &path, &data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(BridgeError::Io(e));
        }

        debug!(key = key, "Stored blob");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}
