//! Envelope - one structured chat payload.
//!
//! Envelopes are untyped: the relay only owns the content field. Every other
//! field (sender name, colour, anything a client adds) is carried through
//! verbatim and is NOT escaped; clients must render those fields as text.

use serde_json::{Map, Value};

use crate::TypesError;

/// Wire name of the content field, the only field the relay classifies.
pub const CONTENT_FIELD: &str = "mensaje";

/// A chat envelope: a JSON object with a string content field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Parse an envelope from its JSON text form.
    ///
    /// Fails if the text is not JSON or is JSON but not an object. A missing
    /// or non-string content field is *not* a parse error; see
    /// [`Envelope::content`].
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        match serde_json::from_str::<Value>(raw).map_err(TypesError::MalformedEnvelope)? {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(TypesError::NotAnObject),
        }
    }

    /// An envelope whose only field is an empty content string.
    pub fn empty() -> Self {
        let mut envelope = Self::default();
        envelope.set_content(String::new());
        envelope
    }

    /// The raw content string.
    pub fn content(&self) -> Result<&str, TypesError> {
        self.fields
            .get(CONTENT_FIELD)
            .and_then(Value::as_str)
            .ok_or(TypesError::InvalidContentField {
                field: CONTENT_FIELD,
            })
    }

    /// Overwrite the content field, leaving every other field untouched.
    pub fn set_content(&mut self, content: String) {
        self.fields
            .insert(CONTENT_FIELD.to_string(), Value::String(content));
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String, TypesError> {
        serde_json::to_string(&self.fields).map_err(TypesError::Serialization)
    }

    /// Convert into a JSON value (for embedding in a [`crate::ServerEvent`]).
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_object_envelope() {
        let env = Envelope::parse(r##"{"nombre":"Ana","mensaje":"hola","color":"#f00"}"##)
            .unwrap();
        assert_eq!(env.content().unwrap(), "hola");
        assert_eq!(env.fields.get("nombre"), Some(&json!("Ana")));
        assert_eq!(env.fields.get("color"), Some(&json!("#f00")));
        assert_eq!(env.fields.len(), 3);
    }

    #[test]
    fn parse_rejects_invalid_json() {
        let err = Envelope::parse("{not json").unwrap_err();
        assert!(matches!(err, TypesError::MalformedEnvelope(_)));
    }

    #[test]
    fn parse_rejects_non_object() {
        assert!(matches!(
            Envelope::parse("[1,2,3]"),
            Err(TypesError::NotAnObject)
        ));
        assert!(matches!(
            Envelope::parse("\"mensaje\""),
            Err(TypesError::NotAnObject)
        ));
    }

    #[test]
    fn missing_content_is_invalid_field() {
        let env = Envelope::parse(r#"{"nombre":"Ana"}"#).unwrap();
        assert!(matches!(
            env.content(),
            Err(TypesError::InvalidContentField { field: "mensaje" })
        ));
    }

    #[test]
    fn non_string_content_is_invalid_field() {
        let env = Envelope::parse(r#"{"mensaje":{"nested":true}}"#).unwrap();
        assert!(env.content().is_err());

        let env = Envelope::parse(r#"{"mensaje":42}"#).unwrap();
        assert!(env.content().is_err());
    }

    #[test]
    fn set_content_preserves_other_fields() {
        let mut env =
            Envelope::parse(r#"{"nombre":"<b>Ana</b>","mensaje":"x","extra":[1,2]}"#).unwrap();
        env.set_content("replaced".to_string());

        let value = env.into_value();
        assert_eq!(value["mensaje"], "replaced");
        assert_eq!(value["nombre"], "<b>Ana</b>");
        assert_eq!(value["extra"], json!([1, 2]));
    }

    #[test]
    fn empty_envelope_has_empty_content() {
        let env = Envelope::empty();
        assert_eq!(env.content().unwrap(), "");
        assert_eq!(env.to_json().unwrap(), r#"{"mensaje":""}"#);
    }
}
