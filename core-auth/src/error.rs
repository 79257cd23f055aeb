use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The request carried no credential at all
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    /// The credential was present but failed verification
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Signing keys could not be fetched or decoded
    #[error("Signing keys unavailable: {0}")]
    KeysUnavailable(String),

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether the failure came from the request's own credential rather than
    /// from talking to the identity provider.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            AuthError::MissingCredential(_)
                | AuthError::InvalidCredential(_)
                | AuthError::InvalidAuthCode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
