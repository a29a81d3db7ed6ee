//! Passthrough serializer

use serde_json::Value;

use super::{value_kind, Serializer, SerializerError};

/// Raw passthrough: strings are stored as their UTF-8 bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneSerializer;

impl Serializer for NoneSerializer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        match value {
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => Err(SerializerError::UnsupportedValue {
                serializer: "none",
                kind: value_kind(other),
            }),
        }
    }

    fn unserialize(&self, bytes: &[u8]) -> Result<Value, SerializerError> {
        std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| SerializerError::malformed("none", e))
    }
}
