//! Error types for the storage layer
//!
//! Connection and configuration failures are surfaced to the caller.
//! Corrupt or undecodable payloads never show up here: adapters turn
//! those into cache misses.

use thiserror::Error;

use crate::serializer::SerializerError;

// == Storage Error Enum ==
/// Unified error type for every adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend rejected the logical database index
    #[error("Redis server selected database failed")]
    SelectDatabase,

    /// The backend rejected the configured credentials
    #[error("Failed to authenticate with the Redis server")]
    Authentication,

    /// Transport or TLS failure. The message is informational only and may be empty.
    #[error("{0}")]
    Connection(String),

    /// The backend refused a command for a reason other than the connection
    #[error("Backend command failed: {0}")]
    Backend(String),

    /// Invalid adapter or serializer configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The serializer refused the value being written
    #[error("Cannot serialize value: {0}")]
    Serialization(#[from] SerializerError),

    /// Filesystem failure outside of reading a single entry
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    // == Classification ==
    /// Returns true for failures that mean the backend cannot be reached or used.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StorageError::SelectDatabase
                | StorageError::Authentication
                | StorageError::Connection(_)
        )
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the storage layer.
pub type Result<T> = std::result::Result<T, StorageError>;
