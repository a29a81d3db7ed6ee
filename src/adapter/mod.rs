//! Adapter Module
//!
//! The uniform storage contract and its backends: in-process memory,
//! sharded files on disk, and Redis.
//!
//! Every miss-like condition (absent key, expired entry, undecodable
//! payload) comes back as `Ok(None)` / the caller's default. Only backend
//! failures (cannot connect, authenticate or select a database) are errors.

mod codec;
mod entry;
mod factory;
mod lru;
mod memory;
mod options;
mod redis;
mod stream;


use std::fmt::Debug;
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

// Re-export public types
pub use self::redis::RedisAdapter;
pub use entry::{current_timestamp_ms, CacheEntry, Expiry};
pub use factory::AdapterFactory;
pub use memory::MemoryAdapter;
pub use options::{
    AdapterConfig, AdapterOptions, MemoryOptions, RedisAuth, RedisOptions, SslOptions,
    StreamOptions,
};
pub use stream::StreamAdapter;

// == Adapter Trait ==
/// The storage contract shared by every backend.
///
/// Operations are synchronous and may block on disk or network I/O.
pub trait Adapter: Debug + Send + Sync {
    /// Returns the stored value, or `None` when the key is absent, expired
    /// or its payload cannot be decoded.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Like [`Adapter::get`] but falls back to `default` on a miss.
    fn get_or(&self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Stores `value`. Without `ttl` the adapter's default TTL applies, and
    /// without that the entry never expires. A zero TTL deletes the key.
    ///
    /// Returns whether the write succeeded.
    fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool>;

    /// Stores `value` with no expiration, ignoring the default TTL.
    fn set_forever(&self, key: &str, value: &Value) -> Result<bool>;

    /// Whether a live entry exists, without decoding it.
    fn has(&self, key: &str) -> Result<bool>;

    /// Removes `key`. Returns whether anything was removed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// Removes every entry owned by this adapter.
    fn clear(&self) -> Result<bool>;

    /// Adds `by` to an integer entry, keeping its expiration.
    ///
    /// Returns the new value, or `None` if the key is absent or not an integer.
    fn increment(&self, key: &str, by: i64) -> Result<Option<i64>>;

    /// Subtracts `by` from an integer entry.
    fn decrement(&self, key: &str, by: i64) -> Result<Option<i64>> {
        match by.checked_neg() {
            Some(delta) => self.increment(key, delta),
            None => Ok(None),
        }
    }

    /// Live keys starting with `prefix`, without the adapter's own namespace, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Eagerly drops expired entries, returning how many were removed.
    ///
    /// Backends that enforce expiry themselves report zero.
    fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }

    /// Namespace this adapter applies to keys.
    fn prefix(&self) -> &str;
}
