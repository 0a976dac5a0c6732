//! Frames written from the relay to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Envelope, TypesError};

/// An outbound frame.
///
/// Serialized as `{"event":"message","data":{...}}` for broadcasts and
/// `{"event":"error","data":"..."}` for connection-local notices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// A processed envelope, sent to every connection.
    Message(Value),
    /// A human-readable notice, sent only to the originating connection.
    Error(String),
}

impl ServerEvent {
    /// Wrap a processed envelope for broadcast.
    pub fn message(envelope: Envelope) -> Self {
        Self::Message(envelope.into_value())
    }

    /// Build an error notice.
    pub fn error(notice: impl Into<String>) -> Self {
        Self::Error(notice.into())
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(self).map_err(TypesError::Serialization)
    }
}
