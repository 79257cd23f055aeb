//! Google Photos Picker API connector
//!
//! Implements `PickerService` for the Picker API v1.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::picker::{ItemsPage, MediaItem, PickerService, RemoteSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GooglePhotosError;
use crate::types::{MediaItemsListResponse, PickerSession};

/// Picker API base URL
pub const PICKER_API_BASE: &str = "https://photospicker.googleapis.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Photos Picker connector
///
/// Every call carries the caller's bearer token; the connector itself is
/// stateless and shared across owners. Non-success responses are returned as
/// errors without retrying: the job driver owns retry policy.
///
/// # Example
///
/// ```ignore
/// use provider_google_photos::GooglePhotosPicker;
/// use bridge_traits::picker::PickerService;
///
/// let picker = GooglePhotosPicker::new(http_client);
/// let session = picker.create_session(&grant.access_token).await?;
/// ```
pub struct GooglePhotosPicker {
    http_client: Arc<dyn HttpClient>,
    api_base: String,
}

impl GooglePhotosPicker {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self::with_base_url(http_client, PICKER_API_BASE)
    }

    /// Point the connector at a different API host (tests, proxies)
    pub fn with_base_url(http_client: Arc<dyn HttpClient>, api_base: impl Into<String>) -> Self {
        Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, request: HttpRequest, access_token: &str) -> HttpRequest {
        request
            .bearer_token(access_token)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    async fn send(
        &self,
        request: HttpRequest,
        session_id: Option<&str>,
    ) -> std::result::Result<HttpResponse, GooglePhotosError> {
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let body = response.text_lossy();
            warn!(status = response.status, "Picker API request failed");
            return Err(GooglePhotosError::from_status(response.status, &body, session_id));
        }

        Ok(response)
    }

    fn parse_session(response: &HttpResponse) -> Result<RemoteSession> {
        let session: PickerSession = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse session: {}", e))
        })?;
        Ok(session.into_remote()?)
    }
}

#[async_trait]
impl PickerService for GooglePhotosPicker {
    #[instrument(skip(self, access_token))]
    async fn create_session(&self, access_token: &str) -> Result<RemoteSession> {
        let url = format!("{}/v1/sessions", self.api_base);
        let request = self.request(HttpRequest::post(url), access_token);

        let response = self.send(request, None).await?;
        let session = Self::parse_session(&response)?;

        info!(session_id = %session.id, "Created picker session");
        Ok(session)
    }

    #[instrument(skip(self, access_token), fields(session_id = %session_id))]
    async fn get_session(&self, access_token: &str, session_id: &str) -> Result<RemoteSession> {
        let url = format!(
            "{}/v1/sessions/{}",
            self.api_base,
            urlencoding::encode(session_id)
        );
        let request = self.request(HttpRequest::get(url), access_token);

        let response = self.send(request, Some(session_id)).await?;
        let session = Self::parse_session(&response)?;

        debug!(media_selected = session.media_selected, "Fetched picker session");
        Ok(session)
    }

    #[instrument(skip(self, access_token), fields(session_id = %session_id))]
    async fn list_items(
        &self,
        access_token: &str,
        session_id: &str,
        page_token: Option<&str>,
    ) -> Result<ItemsPage> {
        let mut url = format!(
            "{}/v1/mediaItems?sessionId={}",
            self.api_base,
            urlencoding::encode(session_id)
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        let request = self.request(HttpRequest::get(url), access_token);

        let response = self.send(request, Some(session_id)).await?;
        let list: MediaItemsListResponse = serde_json::from_slice(&response.body).map_err(|e| {
            GooglePhotosError::ParseError(format!("Failed to parse media items: {}", e))
        })?;

        let items: Vec<MediaItem> = list.media_items.into_iter().map(MediaItem::from).collect();
        debug!(
            count = items.len(),
            has_more = list.next_page_token.is_some(),
            "Listed picked items"
        );

        Ok(ItemsPage {
            items,
            next_page_token: list.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}
