//! Error types for the Google Photos Picker provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Photos Picker errors
#[derive(Error, Debug)]
pub enum GooglePhotosError {
    /// Access token rejected (401/403)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned a non-success status
    #[error("Picker API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Session does not exist or has expired
    #[error("Picker session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, GooglePhotosError>;

impl GooglePhotosError {
    /// Classify a non-success response
    pub fn from_status(status_code: u16, body: &str, session_id: Option<&str>) -> Self {
        match (status_code, session_id) {
            (401 | 403, _) => GooglePhotosError::AuthenticationFailed(format!(
                "status {}: {}",
                status_code, body
            )),
            (404, Some(id)) => GooglePhotosError::SessionNotFound {
                session_id: id.to_string(),
            },
            _ => GooglePhotosError::ApiError {
                status_code,
                message: body.to_string(),
            },
        }
    }
}

impl From<GooglePhotosError> for BridgeError {
    fn from(error: GooglePhotosError) -> Self {
        match error {
            GooglePhotosError::BridgeError(e) => e,
            GooglePhotosError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
