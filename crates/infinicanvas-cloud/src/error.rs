//! Cloud client errors.

use infinicanvas_core::storage::StorageError;
use thiserror::Error;

/// Errors from talking to the backend.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("Backend URL or API key is not configured")]
    NotConfigured,
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend answered with an error status.
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CloudError {
    /// Message for the user: the backend's own wording when it gave one,
    /// otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            CloudError::Api { message, .. } if !message.is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }

    /// HTTP status of a backend error.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Api { status, .. } => Some(*status),
            CloudError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;
