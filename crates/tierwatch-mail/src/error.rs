//! Error types for mailbox ingestion

/// Failure of a mailbox operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    /// Login or transport failure; the connection is unusable
    #[error("mailbox connection lost: {0}")]
    Connection(String),

    /// The server answered something unexpected
    #[error("mailbox protocol error: {0}")]
    Protocol(String),

    /// One message could not be decoded
    #[error("message {uid} unreadable: {reason}")]
    Parse {
        /// Mailbox UID
        uid: u32,
        /// Decoder message
        reason: String,
    },

    /// A blocking mailbox call did not complete
    #[error("mailbox worker failed: {0}")]
    Worker(String),

    /// The code sink refused a code
    #[error("code delivery failed: {0}")]
    Delivery(String),
}

impl MailError {
    /// Whether the connection must be dropped and re-established
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Protocol(_) | Self::Worker(_))
    }
}

/// Result alias for mailbox operations
pub type MailResult<T> = Result<T, MailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_failures_drop_the_connection() {
        assert!(MailError::Connection("eof".into()).is_connection_lost());
        assert!(MailError::Worker("panicked".into()).is_connection_lost());
        assert!(!MailError::Parse {
            uid: 3,
            reason: "bad header".into()
        }
        .is_connection_lost());
        assert!(!MailError::Delivery("channel gone".into()).is_connection_lost());
    }
}
