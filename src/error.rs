//! Error types for dialectic-core.

use thiserror::Error;

/// Result type alias using dialectic-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during harness operations.
#[derive(Error, Debug)]
pub enum Error {
    /// LLM transport error (network failure, bad status, rate limit)
    #[error("Oracle transport error: {provider} - {message}")]
    Transport { provider: String, message: String },

    /// Timeout during an oracle call
    #[error("Oracle call timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Retries exhausted for an oracle call
    #[error("Oracle failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Non-retryable API rejection (bad request, auth failure)
    #[error("Oracle API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Ingested source material produced no usable claims
    #[error("Claim extraction error: {0}")]
    ClaimExtraction(String),

    /// Malformed ingest input (no url or text, unfetchable url)
    #[error("Ingest error: {0}")]
    Ingest(String),

    /// Session was cancelled by the caller
    #[error("Session cancelled")]
    Cancelled,

    /// Unknown session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a retries-exhausted error.
    pub fn retries_exhausted(attempts: u32, message: impl Into<String>) -> Self {
        Self::RetriesExhausted {
            attempts,
            message: message.into(),
        }
    }

    /// True for errors the pass runner retries before surfacing.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}
