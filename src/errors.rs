//! Error types for tutor-rag
//!
//! Two failure channels are kept apart: [`ServiceError`] covers calls to the
//! external embedding and chat services (retrying later is safe), while
//! [`RagError::CorruptIndex`] means the persisted index itself is broken.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of an external embedding or chat-completion call
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport-level failure (connect, timeout, body decode)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status returned by the service
    #[error("Service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// Response arrived but could not be used
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),

    /// Service refused or is not reachable for a non-HTTP reason
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// API key is unset or empty; carries where it was expected
    #[error("Missing API key: {0}")]
    MissingApiKey(String),
}

impl ServiceError {
    /// Whether a later attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ServiceError::Api { status, .. } => *status == 429 || *status >= 500,
            ServiceError::Unavailable(_) => true,
            ServiceError::InvalidResponse(_) | ServiceError::MissingApiKey(_) => false,
        }
    }
}

/// Main error type for the retrieval subsystem
#[derive(Error, Debug)]
pub enum RagError {
    /// Persisted index is structurally broken
    #[error("Corrupt index at {}: {reason}", path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    /// In-memory index operation would break an index invariant
    #[error("Index invariant violated: {0}")]
    InvariantViolation(String),

    /// Corpus could not be loaded or is out of order
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// External service failure surfaced to the caller
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

impl RagError {
    /// Build a corrupt-index error for the given file
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        RagError::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Structural problems with stored data, as opposed to transient failures
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RagError::CorruptIndex { .. } | RagError::InvariantViolation(_)
        )
    }
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RagError>;

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_index_display() {
        let err = RagError::corrupt("/tmp/index.json", "3 vectors but 2 metadata entries");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/index.json"));
        assert!(msg.contains("3 vectors"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_service_error_is_not_fatal() {
        let err = RagError::from(ServiceError::Unavailable("quota".to_string()));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_retryable_statuses() {
        let throttled = ServiceError::Api {
            status: 429,
            body: String::new(),
        };
        let bad_request = ServiceError::Api {
            status: 400,
            body: String::new(),
        };
        assert!(throttled.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!ServiceError::MissingApiKey("KEY".to_string()).is_retryable());
    }
}
