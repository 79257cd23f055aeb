use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    /// Verified request carried no subject to own the job
    #[error("Verified request has no subject")]
    MissingSubject,

    #[error("Picker error: {0}")]
    Picker(String),

    #[error("Import error: {0}")]
    Import(#[from] core_import::ImportError),
}

impl ServiceError {
    /// Whether the caller should see 403
    pub fn is_forbidden(&self) -> bool {
        match self {
            ServiceError::Auth(e) => e.is_credential_failure(),
            ServiceError::Import(e) => e.kind() == core_import::ErrorKind::Auth,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
