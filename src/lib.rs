//! kvstash - pluggable key-value storage adapters
//!
//! One contract ([`Adapter`]) over an in-process map, sharded files on disk
//! and Redis, with per-key TTL and pluggable value serializers.

pub mod adapter;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod serializer;
pub mod tasks;

pub use adapter::{Adapter, AdapterConfig, AdapterFactory};
pub use api::AppState;
pub use config::Config;
pub use error::{Result, StorageError};
pub use serializer::{Serializer, SerializerFactory};
pub use tasks::spawn_cleanup_task;
