use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Failure category, used to decide whether a step may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, invalid or expired credential. Never retried automatically.
    Auth,
    /// Remote or storage failure. Persisted state is untouched and the next
    /// trigger retries.
    Transient,
    /// An expected field was absent or a persisted record is inconsistent.
    Data,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Picker service error: {0}")]
    Picker(String),

    #[error("Download of item {item_id} failed: {message}")]
    Download { item_id: String, message: String },

    #[error("Blob write to {key} failed: {message}")]
    Blob { key: String, message: String },

    #[error("State store error: {0}")]
    Store(String),

    #[error("Corrupt record at {key}: {message}")]
    CorruptRecord { key: String, message: String },

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Job {job_id} for {owner_id} was replaced or removed")]
    Superseded { owner_id: String, job_id: String },
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Auth(_) => ErrorKind::Auth,
            ImportError::Picker(_)
            | ImportError::Download { .. }
            | ImportError::Blob { .. }
            | ImportError::Store(_) => ErrorKind::Transient,
            ImportError::CorruptRecord { .. }
            | ImportError::MissingField(_)
            | ImportError::InvalidStateTransition { .. }
            | ImportError::Superseded { .. } => ErrorKind::Data,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub(crate) fn picker(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(msg) => ImportError::Auth(msg),
            other => ImportError::Picker(other.to_string()),
        }
    }

    pub(crate) fn store(error: BridgeError) -> Self {
        ImportError::Store(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
