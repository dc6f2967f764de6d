//! Error types for the ranking client
//!
//! Not-found is not an error: lookups return `Ok(None)` for it.

/// Failure of one client call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// No credentials were configured
    #[error("credential pool is empty")]
    EmptyKeyPool,

    /// Every credential answered 429 within one call
    #[error("rate limited on all credentials after {attempts} attempts")]
    RateLimited {
        /// Attempts made, one per credential
        attempts: usize,
    },

    /// The request did not complete within the client timeout
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Unexpected HTTP status
    #[error("unexpected status: {0}")]
    Status(u16),

    /// Body did not match the expected document shape
    #[error("decode error: {0}")]
    Decode(String),

    /// The underlying HTTP client could not be constructed
    #[error("client build error: {0}")]
    Build(String),
}

impl ClientError {
    /// Whether retrying on a later cycle can reasonably succeed
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout | Self::Transport(_) => true,
            Self::Status(code) => *code >= 500,
            Self::EmptyKeyPool | Self::Decode(_) | Self::Build(_) => false,
        }
    }
}

/// Result alias for client calls
pub type ClientResult<T> = Result<T, ClientError>;
