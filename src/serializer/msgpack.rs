//! MessagePack serializer

use serde_json::Value;

use super::{Serializer, SerializerError};

/// Compact structured encoding via MessagePack. The default strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgpackSerializer;

impl Serializer for MsgpackSerializer {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        rmp_serde::to_vec(value).map_err(|e| SerializerError::malformed("msgpack", e))
    }

    fn unserialize(&self, bytes: &[u8]) -> Result<Value, SerializerError> {
        rmp_serde::from_slice(bytes).map_err(|e| SerializerError::malformed("msgpack", e))
    }

    // Strings, floats and containers never encode as bare digits
    fn integers_as_text(&self) -> bool {
        true
    }
}
