//! Media Picker Abstraction
//!
//! A picker session is a remote, stateful object representing a user's
//! in-progress media selection. The provider crate implements
//! [`PickerService`] against the real REST API; the import core only sees the
//! types in this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Remote picker session as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSession {
    pub id: String,
    /// URI the user opens to pick media
    pub picker_uri: String,
    /// Suggested client polling interval
    pub poll_interval_seconds: u64,
    /// True once the user has finished selecting
    pub media_selected: bool,
}

/// Kind of a selected item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Unspecified,
    Photo,
    Video,
}

/// A single selected photo or video
///
/// Immutable once listed; persisted verbatim inside the job record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    /// Creation time as reported by the provider (RFC 3339)
    pub created_at: String,
    pub media_type: MediaType,
    /// Base URL for downloading the item's bytes
    pub source_url: String,
    pub mime_type: String,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl MediaItem {
    /// Deterministic blob key: `{created_at}-{filename}`.
    ///
    /// Path separators in the filename are replaced so the key stays a single
    /// path segment.
    pub fn blob_key(&self) -> String {
        let filename = self.filename.replace(['/', '\\'], "_");
        format!("{}-{}", self.created_at, filename)
    }

    /// Full-resolution download URL: `{source_url}=w{width}-h{height}-d`
    pub fn download_url(&self) -> String {
        format!("{}=w{}-h{}-d", self.source_url, self.width, self.height)
    }
}

/// One page of a selected-items listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemsPage {
    pub items: Vec<MediaItem>,
    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Picker service trait
///
/// No method retries internally; a non-success response is an error and the
/// caller decides when to try again.
#[async_trait]
pub trait PickerService: Send + Sync {
    /// Create a new picker session
    async fn create_session(&self, access_token: &str) -> Result<RemoteSession>;

    /// Fetch the current state of a session
    async fn get_session(&self, access_token: &str, session_id: &str) -> Result<RemoteSession>;

    /// List one page of selected items
    ///
    /// Pass `None` for the first page, then each returned `next_page_token`
    /// until none is returned.
    async fn list_items(
        &self,
        access_token: &str,
        session_id: &str,
        page_token: Option<&str>,
    ) -> Result<ItemsPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(filename: &str) -> MediaItem {
        MediaItem {
            id: "item-1".to_string(),
            created_at: "2024-03-01T10:00:00Z".to_string(),
            media_type: MediaType::Photo,
            source_url: "https://lh3.example.com/abc".to_string(),
            mime_type: "image/jpeg".to_string(),
            filename: filename.to_string(),
            width: 4032,
            height: 3024,
        }
    }

    #[test]
    fn test_blob_key_is_deterministic() {
        let a = item("IMG_0001.jpg");
        assert_eq!(a.blob_key(), "2024-03-01T10:00:00Z-IMG_0001.jpg");
        assert_eq!(a.blob_key(), a.clone().blob_key());
    }

    #[test]
    fn test_blob_key_flattens_separators() {
        assert_eq!(
            item("../etc/passwd").blob_key(),
            "2024-03-01T10:00:00Z-.._etc_passwd"
        );
    }

    #[test]
    fn test_download_url_is_sized() {
        assert_eq!(
            item("a.jpg").download_url(),
            "https://lh3.example.com/abc=w4032-h3024-d"
        );
    }

    #[test]
    fn test_media_type_serde() {
        let json = serde_json::to_string(&MediaType::Video).unwrap();
        assert_eq!(json, "\"video\"");
        let parsed: MediaType = serde_json::from_str("\"photo\"").unwrap();
        assert_eq!(parsed, MediaType::Photo);
    }
}
