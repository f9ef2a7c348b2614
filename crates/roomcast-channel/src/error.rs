//! Error types for the channel-manager engine.

use thiserror::Error;

/// Result type alias using [`ChannelError`].
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur when talking to a distribution provider.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Credential invalid or expired; unrecoverable without re-link.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Rate-limit retry budget exhausted.
    #[error("rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimitExceeded { retry_after_secs: Option<u64> },

    /// Network-level failure (includes per-call timeouts).
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx business error from the provider. Never retried.
    #[error("provider error {status}: {body}")]
    Provider { status: u16, body: String },

    /// No local entity found for a remote code.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// Booking-level failure during ingest.
    #[error("processing error: {0}")]
    Processing(String),

    /// Configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Local persistence failure surfaced through the store seam.
    #[error("store error: {0}")]
    Store(String),

    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChannelError {
    /// Whether the retry policy may re-attempt the failed call.
    ///
    /// Only transport-level failures are blindly retryable; 429 and 401 have
    /// dedicated handling in the request client, and everything else
    /// indicates a configuration or data problem.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::Transport(_))
    }

    /// Whether the error means the connection needs a manual re-link.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, ChannelError::Auth(_))
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        // Timeouts are treated identically to network failures for retry
        // purposes.
        ChannelError::Transport(e.to_string())
    }
}

impl From<roomcast_db::DbError> for ChannelError {
    fn from(e: roomcast_db::DbError) -> Self {
        ChannelError::Store(e.to_string())
    }
}

impl From<sqlx::Error> for ChannelError {
    fn from(e: sqlx::Error) -> Self {
        ChannelError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ChannelError::Transport("reset".into()).is_retryable());
        assert!(!ChannelError::Auth("expired".into()).is_retryable());
        assert!(!ChannelError::Provider {
            status: 422,
            body: "bad field".into()
        }
        .is_retryable());
        assert!(!ChannelError::RateLimitExceeded {
            retry_after_secs: Some(30)
        }
        .is_retryable());
    }

    #[test]
    fn test_auth_classification() {
        assert!(ChannelError::Auth("nope".into()).is_auth());
        assert!(!ChannelError::Transport("reset".into()).is_auth());
    }
}
