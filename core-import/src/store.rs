//! # Job and Status Stores
//!
//! Typed accessors over a namespaced [`KeyValueStore`]. Job records and status
//! records live under separate prefixes so the two never collide, and both
//! are stored as JSON documents keyed by owner id.
//!
//! Writes are last-write-wins. No compare-and-swap is attempted: concurrent
//! steps for one owner may interleave, which the driver tolerates. A step
//! checks [`JobStateStore::is_current`] before each write so it never lands
//! on a record that a newer import has replaced.

use std::sync::Arc;

use bridge_traits::storage::KeyValueStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::{ImportError, Result};
use crate::job::{JobRecord, StatusRecord};

pub const DEFAULT_JOB_PREFIX: &str = "job:";
pub const DEFAULT_STATUS_PREFIX: &str = "status:";

#[derive(Clone)]
struct JsonStore {
    kv: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl JsonStore {
    fn key(&self, owner_id: &str) -> String {
        format!("{}{}", self.prefix, owner_id)
    }

    async fn get<T: DeserializeOwned>(&self, owner_id: &str) -> Result<Option<T>> {
        let key = self.key(owner_id);
        let Some(raw) = self.kv.get(&key).await.map_err(ImportError::store)? else {
            return Ok(None);
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ImportError::CorruptRecord {
                key,
                message: e.to_string(),
            })
    }

    async fn put<T: Serialize>(&self, owner_id: &str, value: &T) -> Result<()> {
        let key = self.key(owner_id);
        let raw = serde_json::to_string(value).map_err(|e| ImportError::CorruptRecord {
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.kv.put(&key, &raw).await.map_err(ImportError::store)
    }

    async fn delete(&self, owner_id: &str) -> Result<()> {
        self.kv
            .delete(&self.key(owner_id))
            .await
            .map_err(ImportError::store)
    }
}

/// Authoritative job records, one per owner
#[derive(Clone)]
pub struct JobStateStore {
    inner: JsonStore,
}

impl JobStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(kv, DEFAULT_JOB_PREFIX)
    }

    pub fn with_prefix(kv: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            inner: JsonStore {
                kv,
                prefix: prefix.into(),
            },
        }
    }

    /// Load the owner's job record
    ///
    /// A record that fails to parse or violates the state invariants is
    /// reported as a data error rather than silently repaired.
    #[instrument(skip(self))]
    pub async fn load(&self, owner_id: &str) -> Result<Option<JobRecord>> {
        let record: Option<JobRecord> = self.inner.get(owner_id).await?;
        if let Some(job) = &record {
            job.validate().map_err(|e| ImportError::CorruptRecord {
                key: self.inner.key(owner_id),
                message: e.to_string(),
            })?;
            debug!(state = %job.state, pending = job.pending_items.len(), "Loaded job");
        }
        Ok(record)
    }

    /// Persist the record under its owner id
    #[instrument(skip(self, job), fields(owner_id = %job.owner_id, state = %job.state))]
    pub async fn save(&self, job: &JobRecord) -> Result<()> {
        job.validate()?;
        self.inner.put(&job.owner_id, job).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner_id: &str) -> Result<()> {
        self.inner.delete(owner_id).await
    }

    /// Whether the stored record for `job`'s owner is still `job`
    ///
    /// False when the record was deleted or replaced by a newer import.
    pub async fn is_current(&self, job: &JobRecord) -> Result<bool> {
        let stored: Option<JobRecord> = self.inner.get(&job.owner_id).await?;
        Ok(stored.is_some_and(|s| s.job_id == job.job_id))
    }
}

/// UI-facing progress records, one per owner
#[derive(Clone)]
pub struct StatusStore {
    inner: JsonStore,
}

impl StatusStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(kv, DEFAULT_STATUS_PREFIX)
    }

    pub fn with_prefix(kv: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            inner: JsonStore {
                kv,
                prefix: prefix.into(),
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, owner_id: &str) -> Result<Option<StatusRecord>> {
        self.inner.get(owner_id).await
    }

    #[instrument(skip(self, status), fields(owner_id = %status.owner_id, message = %status.message))]
    pub async fn publish(&self, status: &StatusRecord) -> Result<()> {
        self.inner.put(&status.owner_id, status).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, owner_id: &str) -> Result<()> {
        self.inner.delete(owner_id).await
    }
}
