//! Error types for calls against the managed backend.

use thiserror::Error;

/// Errors that can occur while talking to the identity provider, the
/// reservation store or the change feed.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Realtime socket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Missing or invalid connection settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BackendError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Parse(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        BackendError::WebSocket(e.to_string())
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
