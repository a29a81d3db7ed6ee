//! Serializer Module
//!
//! Strategies that turn values into bytes for storage and back.

mod base64;
mod factory;
mod json;
mod msgpack;
mod none;

use std::fmt::Debug;

use serde_json::Value;
use thiserror::Error;

pub use self::base64::Base64Serializer;
pub use factory::{SerializerFactory, DEFAULT_SERIALIZER};
pub use json::JsonSerializer;
pub use msgpack::MsgpackSerializer;
pub use none::NoneSerializer;

// == Serializer Error ==
/// Data error raised while encoding or decoding a payload.
#[derive(Error, Debug)]
pub enum SerializerError {
    /// The strategy only accepts certain value shapes
    #[error("{serializer} serializer does not accept {kind} values")]
    UnsupportedValue {
        serializer: &'static str,
        kind: &'static str,
    },

    /// The stored bytes could not be decoded
    #[error("malformed {serializer} payload: {reason}")]
    Malformed {
        serializer: &'static str,
        reason: String,
    },
}

impl SerializerError {
    pub(crate) fn malformed(serializer: &'static str, reason: impl ToString) -> Self {
        SerializerError::Malformed {
            serializer,
            reason: reason.to_string(),
        }
    }
}

// == Serializer Trait ==
/// A pluggable value encoding.
pub trait Serializer: Debug + Send + Sync {
    /// Registry name of this strategy.
    fn name(&self) -> &'static str;

    /// Encodes a value for storage.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, SerializerError>;

    /// Decodes stored bytes. Malformed input is an error, never a panic.
    fn unserialize(&self, bytes: &[u8]) -> Result<Value, SerializerError>;

    /// Whether integers may be stored as bare decimal text next to this
    /// strategy's payloads. Only true when no other value serializes to
    /// ASCII digits, so the two cannot be confused on read.
    fn integers_as_text(&self) -> bool {
        false
    }
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
