//! Transfer Worker
//!
//! Copies one selected item into blob storage: an authenticated download of
//! the sized source URL followed by an overwrite at the item's deterministic
//! key. Either half failing leaves nothing for the caller to undo; a repeated
//! transfer of the same item rewrites the same key.

use std::sync::Arc;
use std::time::Duration;

use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::picker::MediaItem;
use bridge_traits::storage::BlobStore;
use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::error::{ImportError, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

pub struct TransferWorker {
    http_client: Arc<dyn HttpClient>,
    blobs: Arc<dyn BlobStore>,
}

impl TransferWorker {
    pub fn new(http_client: Arc<dyn HttpClient>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { http_client, blobs }
    }

    /// Fetch the item's full payload
    ///
    /// # Errors
    ///
    /// 401/403 map to [`ImportError::Auth`]; any other non-success status or
    /// network failure maps to [`ImportError::Download`].
    #[instrument(skip(self, item, access_token), fields(item_id = %item.id))]
    pub async fn download(&self, item: &MediaItem, access_token: &str) -> Result<Bytes> {
        let request = HttpRequest::get(item.download_url())
            .bearer_token(access_token)
            .timeout(DOWNLOAD_TIMEOUT);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| ImportError::Download {
                item_id: item.id.clone(),
                message: e.to_string(),
            })?;

        match response.status {
            200..=299 => {
                debug!(bytes = response.body.len(), "Downloaded item");
                Ok(response.body)
            }
            401 | 403 => Err(ImportError::Auth(format!(
                "download of {} rejected with status {}",
                item.id, response.status
            ))),
            status => {
                warn!(status, "Item download failed");
                Err(ImportError::Download {
                    item_id: item.id.clone(),
                    message: format!("status {}", status),
                })
            }
        }
    }

    /// Write the payload at the item's deterministic key
    #[instrument(skip(self, item, data), fields(item_id = %item.id, bytes = data.len()))]
    pub async fn store(&self, item: &MediaItem, data: Bytes) -> Result<String> {
        let key = item.blob_key();
        self.blobs
            .put(&key, data)
            .await
            .map_err(|e| ImportError::Blob {
                key: key.clone(),
                message: e.to_string(),
            })?;
        debug!(key = %key, "Stored item");
        Ok(key)
    }

    /// Download then store
    pub async fn transfer(&self, item: &MediaItem, access_token: &str) -> Result<String> {
        let data = self.download(item, access_token).await?;
        self.store(item, data).await
    }
}
