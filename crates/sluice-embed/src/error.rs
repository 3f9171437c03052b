//! Error types for embedding operations.

use thiserror::Error;

/// Errors that can occur when generating embeddings.
#[derive(Error, Debug)]
pub enum EmbedError {
    /// Connection error - unable to reach the server.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout.
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Provider asked us to slow down (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Provider failed on its side (HTTP 5xx).
    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// Request rejected (HTTP 4xx other than 429).
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The requested model is not available.
    #[error("Model not found: {model}. Run 'ollama pull {model}' to download it.")]
    ModelNotFound { model: String },

    /// Ollama server is not running.
    #[error("Ollama server is not running at {host}. Start it with 'ollama serve'.")]
    ServerNotRunning { host: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Response carried a different number of vectors than inputs.
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Primary and fallback both failed.
    #[error("Embedding failed on all providers (primary: {primary}; fallback: {fallback})")]
    Exhausted { primary: String, fallback: String },

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmbedError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbedError::Connection(_)
            | EmbedError::Timeout { .. }
            | EmbedError::RateLimited(_)
            | EmbedError::Server { .. }
            | EmbedError::ServerNotRunning { .. } => true,
            EmbedError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            429 => EmbedError::RateLimited(message),
            500..=599 => EmbedError::Server { status, message },
            _ => EmbedError::Api { status, message },
        }
    }

    /// Map a transport error, keeping timeouts and connection failures distinguishable.
    pub fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            EmbedError::Timeout {
                seconds: timeout_secs,
            }
        } else if err.is_connect() {
            EmbedError::Connection(err.to_string())
        } else {
            EmbedError::Http(err)
        }
    }
}

/// Result type for embedding operations.
pub type EmbedResult<T> = Result<T, EmbedError>;
