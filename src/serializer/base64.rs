//! Base64 serializer
//!
//! Accepts strings only.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use super::{value_kind, Serializer, SerializerError};

/// Base64 text encoding of string values.
#[derive(Debug, Default, Clone, Copy)]
pub struct Base64Serializer;

impl Serializer for Base64Serializer {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        match value {
            Value::String(s) => Ok(STANDARD.encode(s.as_bytes()).into_bytes()),
            other => Err(SerializerError::UnsupportedValue {
                serializer: "base64",
                kind: value_kind(other),
            }),
        }
    }

    fn unserialize(&self, bytes: &[u8]) -> Result<Value, SerializerError> {
        let decoded = STANDARD
            .decode(bytes)
            .map_err(|e| SerializerError::malformed("base64", e))?;
        String::from_utf8(decoded)
            .map(Value::String)
            .map_err(|e| SerializerError::malformed("base64", e))
    }
}
