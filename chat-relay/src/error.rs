//! Error types for chat-relay.

use chat_core::AdmissionError;
use chat_types::TypesError;

use crate::limits::RateLimitError;

/// Main error type for chat-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-message errors. None of these close the connection; each becomes an
/// error notice for the originating connection only.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Message rejected by the size gate, the connection's window or the
    /// global limiter.
    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    /// Frame type the relay does not accept.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Reason the message is invalid.
        reason: String,
    },

    /// Outbound frame could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] TypesError),
}

impl ProtocolError {
    /// Human-readable notice sent back to the originating connection.
    pub fn notice(&self) -> String {
        match self {
            Self::RateLimited(RateLimitError::Admission(e)) => e.notice(),
            Self::RateLimited(RateLimitError::GlobalLimitExceeded) => {
                "The server is busy. Please try again in a moment.".to_string()
            }
            Self::InvalidMessage { .. } => {
                "Invalid message. Messages must be JSON text.".to_string()
            }
            Self::Serialization(_) => {
                "Your message could not be processed. Please try again.".to_string()
            }
        }
    }
}

impl From<AdmissionError> for ProtocolError {
    fn from(e: AdmissionError) -> Self {
        Self::RateLimited(RateLimitError::Admission(e))
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
