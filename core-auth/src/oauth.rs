//! OAuth 2.0 authorization-code flow against the identity provider
//!
//! Builds the consent URL and exchanges the returned code for an access
//! token. The grant is short-lived and never refreshed; the picker scope is
//! read-only.
//!
//! # Example
//!
//! ```ignore
//! use core_auth::oauth::GoogleOAuthClient;
//!
//! let client = GoogleOAuthClient::new(config.oauth.clone(), http_client);
//! let consent = client.authorization_url("https://app.example.com/oauth_callback")?;
//! // ... user consents, callback receives `code` ...
//! let grant = client.exchange(&code, "https://app.example.com/oauth_callback").await?;
//! ```

use crate::error::{AuthError, Result};
use crate::types::AccessGrant;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest};
use bytes::Bytes;
use core_runtime::config::OAuthSettings;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Identity provider client
///
/// Consumed by the service layer when a user starts an import.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent URL the user is redirected to
    fn authorization_url(&self, redirect_url: &str) -> Result<String>;

    /// Exchange an authorization code for an access grant
    ///
    /// `redirect_url` must match the one used to build the consent URL.
    async fn exchange(&self, code: &str, redirect_url: &str) -> Result<AccessGrant>;
}

/// Google OAuth client using a confidential client id/secret pair
pub struct GoogleOAuthClient {
    settings: OAuthSettings,
    http_client: Arc<dyn HttpClient>,
}

impl GoogleOAuthClient {
    pub fn new(settings: OAuthSettings, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            settings,
            http_client,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuthClient {
    fn authorization_url(&self, redirect_url: &str) -> Result<String> {
        let mut url = Url::parse(&self.settings.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("access_type", "offline");

        Ok(url.to_string())
    }

    #[instrument(skip(self, code))]
    async fn exchange(&self, code: &str, redirect_url: &str) -> Result<AccessGrant> {
        if code.trim().is_empty() {
            return Err(AuthError::InvalidAuthCode(
                "Authorization code is empty".to_string(),
            ));
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_url),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ];

        let encoded_body = serde_urlencoded::to_string(&params[..])
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        let request = HttpRequest::post(self.settings.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded_body));

        debug!("Exchanging authorization code");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let error_body = response.text_lossy();
            warn!(
                status = response.status,
                error = %error_body,
                "Token endpoint rejected authorization code"
            );

            if response.is_client_error() {
                return Err(AuthError::InvalidAuthCode(format!(
                    "Token endpoint returned {}: {}",
                    response.status, error_body
                )));
            }
            return Err(AuthError::NetworkError(format!(
                "Token endpoint returned {}",
                response.status
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        debug!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code"
        );

        Ok(AccessGrant::new(
            token_response.access_token,
            token_response.expires_in,
        ))
    }
}

/// Token endpoint response; fields beyond these are ignored.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}
