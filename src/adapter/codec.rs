//! Value Codec
//!
//! Wraps the configured serializer. When the serializer allows it, integers
//! skip the serializer and are stored as decimal text so backend-native
//! counters keep working on them.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::serializer::{Serializer, SerializerError};

#[derive(Debug, Clone)]
pub(crate) struct ValueCodec {
    serializer: Arc<dyn Serializer>,
}

impl ValueCodec {
    pub fn new(serializer: Arc<dyn Serializer>) -> Self {
        Self { serializer }
    }

    pub fn serializer_name(&self) -> &'static str {
        self.serializer.name()
    }

    /// Whether integer entries are stored as bare decimal text.
    pub fn integers_as_text(&self) -> bool {
        self.serializer.integers_as_text()
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, SerializerError> {
        if self.integers_as_text() {
            if let Some(number) = value.as_i64() {
                return Ok(encode_integer(number));
            }
        }
        self.serializer.serialize(value)
    }

    /// Decodes a stored payload. Undecodable payloads are a miss.
    pub fn decode(&self, key: &str, payload: &[u8]) -> Option<Value> {
        if self.integers_as_text() {
            if let Some(number) = parse_integer(payload) {
                return Some(Value::from(number));
            }
        }
        match self.serializer.unserialize(payload) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key, serializer = self.serializer.name(), error = %err, "discarding undecodable entry");
                None
            }
        }
    }

    /// Adds `by` to an integer payload, returning the new number and its
    /// encoding. None for non-integer payloads and on overflow.
    pub fn add_to_integer(&self, payload: &[u8], by: i64) -> Option<(i64, Vec<u8>)> {
        if !self.integers_as_text() {
            return None;
        }
        let updated = parse_integer(payload)?.checked_add(by)?;
        Some((updated, encode_integer(updated)))
    }
}

fn encode_integer(number: i64) -> Vec<u8> {
    number.to_string().into_bytes()
}

/// Parses a payload holding an ASCII decimal `i64`.
fn parse_integer(payload: &[u8]) -> Option<i64> {
    // i64::MIN is 20 bytes of text
    if payload.is_empty() || payload.len() > 20 {
        return None;
    }
    let (sign, digits) = match payload.split_first() {
        Some((b'-', rest)) => ("-", rest),
        _ => ("", payload),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    format!("{sign}{text}").parse().ok()
}
