//! JSON serializer

use serde_json::Value;

use super::{Serializer, SerializerError};

/// Stores values as JSON text.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(value).map_err(|e| SerializerError::malformed("json", e))
    }

    fn unserialize(&self, bytes: &[u8]) -> Result<Value, SerializerError> {
        serde_json::from_slice(bytes).map_err(|e| SerializerError::malformed("json", e))
    }

    // Strings, floats and containers never encode as bare digits
    fn integers_as_text(&self) -> bool {
        true
    }
}
