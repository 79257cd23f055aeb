//! Google Photos Picker API response types
//!
//! See: https://developers.google.com/photos/picker/reference/rest

use bridge_traits::picker::{MediaItem, MediaType, RemoteSession};
use serde::{Deserialize, Serialize};

use crate::error::{GooglePhotosError, Result};

/// Picker session resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickerSession {
    pub id: String,

    /// URI the user visits to choose media
    pub picker_uri: String,

    #[serde(default)]
    pub polling_config: Option<PollingConfig>,

    /// Expiry time (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,

    /// Set once the user finished picking
    #[serde(default)]
    pub media_items_set: bool,
}

/// Suggested polling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingConfig {
    /// Duration string such as `"5s"` or `"2.5s"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_in: Option<String>,
}

/// mediaItems.list response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemsListResponse {
    #[serde(default)]
    pub media_items: Vec<PickedMediaItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Picked media item resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedMediaItem {
    pub id: String,

    /// Creation time (RFC 3339)
    pub create_time: String,

    #[serde(rename = "type", default)]
    pub item_type: PickedMediaType,

    pub media_file: MediaFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PickedMediaType {
    #[default]
    TypeUnspecified,
    Photo,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    pub base_url: String,
    pub mime_type: String,
    pub filename: String,
    #[serde(default)]
    pub media_file_metadata: MediaFileMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFileMetadata {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Parse a protobuf-style duration (`"5s"`, `"2.5s"`) into whole seconds,
/// rounding up.
pub fn parse_duration_secs(raw: &str) -> Result<u64> {
    let number = raw
        .trim()
        .strip_suffix('s')
        .ok_or_else(|| GooglePhotosError::ParseError(format!("Duration without unit: {:?}", raw)))?;

    let secs: f64 = number
        .parse()
        .map_err(|_| GooglePhotosError::ParseError(format!("Invalid duration: {:?}", raw)))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(GooglePhotosError::ParseError(format!(
            "Invalid duration: {:?}",
            raw
        )));
    }

    Ok(secs.ceil() as u64)
}

impl PickerSession {
    pub fn into_remote(self) -> Result<RemoteSession> {
        let poll_interval_seconds = match self
            .polling_config
            .as_ref()
            .and_then(|c| c.poll_interval.as_deref())
        {
            Some(raw) => parse_duration_secs(raw)?,
            None => 0,
        };

        Ok(RemoteSession {
            id: self.id,
            picker_uri: self.picker_uri,
            poll_interval_seconds,
            media_selected: self.media_items_set,
        })
    }
}

impl From<PickedMediaType> for MediaType {
    fn from(value: PickedMediaType) -> Self {
        match value {
            PickedMediaType::TypeUnspecified => MediaType::Unspecified,
            PickedMediaType::Photo => MediaType::Photo,
            PickedMediaType::Video => MediaType::Video,
        }
    }
}

impl From<PickedMediaItem> for MediaItem {
    fn from(item: PickedMediaItem) -> Self {
        MediaItem {
            id: item.id,
            created_at: item.create_time,
            media_type: item.item_type.into(),
            source_url: item.media_file.base_url,
            mime_type: item.media_file.mime_type,
            filename: item.media_file.filename,
            width: item.media_file.media_file_metadata.width,
            height: item.media_file.media_file_metadata.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration_secs("5s").unwrap(), 5);
        assert_eq!(parse_duration_secs("2.5s").unwrap(), 3);
        assert_eq!(parse_duration_secs("0s").unwrap(), 0);
        assert!(parse_duration_secs("5").is_err());
        assert!(parse_duration_secs("fast").is_err());
        assert!(parse_duration_secs("-1s").is_err());
    }

    #[test]
    fn test_session_conversion() {
        let json = r#"{
            "id": "sess-1",
            "pickerUri": "https://photos.google.com/picker/sess-1",
            "pollingConfig": {"pollInterval": "5s", "timeoutIn": "1800s"},
            "expireTime": "2024-05-01T12:30:00Z",
            "mediaItemsSet": false
        }"#;

        let session: PickerSession = serde_json::from_str(json).unwrap();
        let remote = session.into_remote().unwrap();

        assert_eq!(remote.id, "sess-1");
        assert_eq!(remote.poll_interval_seconds, 5);
        assert!(!remote.media_selected);
    }

    #[test]
    fn test_media_item_conversion() {
        let json = r#"{
            "id": "item-1",
            "createTime": "2024-04-30T08:15:00Z",
            "type": "VIDEO",
            "mediaFile": {
                "baseUrl": "https://lh3.googleusercontent.com/xyz",
                "mimeType": "video/mp4",
                "filename": "clip.mp4",
                "mediaFileMetadata": {"width": 1920, "height": 1080, "cameraMake": "X"}
            }
        }"#;

        let picked: PickedMediaItem = serde_json::from_str(json).unwrap();
        let item: MediaItem = picked.into();

        assert_eq!(item.media_type, MediaType::Video);
        assert_eq!(item.created_at, "2024-04-30T08:15:00Z");
        assert_eq!(item.source_url, "https://lh3.googleusercontent.com/xyz");
        assert_eq!((item.width, item.height), (1920, 1080));
    }

    #[test]
    fn test_empty_list_response() {
        let response: MediaItemsListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.media_items.is_empty());
        assert!(response.next_page_token.is_none());
    }
}
