//! Error types for the chat wire format.

use thiserror::Error;

/// Errors that can occur while handling envelopes and frames.
#[derive(Debug, Error)]
pub enum TypesError {
    /// The payload is not valid JSON
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The payload is valid JSON but not an object
    #[error("malformed envelope: expected a JSON object")]
    NotAnObject,

    /// The content field is missing or is not a string
    #[error("invalid content field: `{field}` must be a string")]
    InvalidContentField {
        /// Name of the offending field
        field: &'static str,
    },

    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}
