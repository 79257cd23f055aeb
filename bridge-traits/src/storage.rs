//! Storage Abstractions
//!
//! Two durable stores back the import pipeline:
//!
//! - [`BlobStore`]: object storage for transferred media bytes. Writes
//!   overwrite whatever is at the key; there is no versioning and no
//!   read-back verification.
//! - [`KeyValueStore`]: small string values keyed by string, used for the
//!   job record and the UI-facing status record. Last write wins.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Object storage for media payloads
///
/// ```ignore
/// use bridge_traits::storage::BlobStore;
///
/// async fn save(store: &dyn BlobStore, key: &str, data: Bytes) -> Result<()> {
///     store.put(key, data).await
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Check whether an object exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Namespaced key-value storage
///
/// Implementations give no ordering guarantee across concurrent writers for
/// the same key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store a value, overwriting any previous one
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a value. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
