//! Message validation: parse, classify, render, re-serialize.
//!
//! Validation never fails. Malformed envelopes and unusable content fields
//! degrade to an envelope with empty content so the connection keeps working;
//! every field other than the content field passes through untouched.

use chat_types::{Classification, ContentKind, Envelope, TypesError};

use crate::classify::classify;
use crate::escape::escape_html;
use crate::render::render;

/// Result of validating one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMessage {
    /// The envelope with its content replaced by the rendered form.
    pub envelope: Envelope,
    /// What the content was classified as.
    pub kind: ContentKind,
}

/// Validate one raw inbound payload.
pub fn validate(raw: &str) -> ValidatedMessage {
    let mut envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!("Malformed envelope, broadcasting empty content: {}", e);
            return ValidatedMessage {
                envelope: Envelope::empty(),
                kind: ContentKind::Invalid,
            };
        }
    };

    let classification = match envelope.content() {
        Ok("") => Err(ContentKind::Empty),
        Ok(content) => Ok(classify(content)),
        Err(TypesError::InvalidContentField { field }) => {
            tracing::debug!("Envelope field `{}` missing or not a string", field);
            Err(ContentKind::Invalid)
        }
        Err(e) => {
            tracing::error!("Unexpected envelope error: {}", e);
            Err(ContentKind::Invalid)
        }
    };

    let classification = match classification {
        Ok(classification) => classification,
        Err(kind) => {
            envelope.set_content(String::new());
            return ValidatedMessage { envelope, kind };
        }
    };

    if let Classification::Blocked { signature } = &classification {
        tracing::warn!(signature, "Script injection attempt blocked");
    }

    let kind = classification.kind();
    tracing::debug!(%kind, "Message classified");
    envelope.set_content(render(&classification));

    ValidatedMessage { envelope, kind }
}

/// Validate a raw payload and return the outbound envelope as JSON text.
pub fn validate_message(raw: &str) -> String {
    let validated = validate(raw);
    match validated.envelope.to_json() {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to serialize validated envelope: {}", e);
            fallback(raw).into_value().to_string()
        }
    }
}

/// Safe fallback when processing hits an internal error: the raw input,
/// escaped, as the only content.
pub fn fallback(raw: &str) -> Envelope {
    let mut envelope = Envelope::default();
    envelope.set_content(escape_html(raw));
    envelope
}
