//! Memory Adapter
//!
//! Process-local map with lazy TTL expiry and an optional LRU capacity bound.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde_json::Value;
use tracing::debug;

use super::codec::ValueCodec;
use super::entry::{current_timestamp_ms, CacheEntry, Expiry};
use super::lru::LruTracker;
use super::options::MemoryOptions;
use super::Adapter;
use crate::error::{Result, StorageError};
use crate::serializer::SerializerFactory;

/// Key prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "mem-";

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    lru: LruTracker,
}

impl MemoryState {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.lru.remove(key);
        self.entries.remove(key)
    }
}

// == Memory Adapter ==
#[derive(Debug)]
pub struct MemoryAdapter {
    prefix: String,
    default_ttl: Option<Duration>,
    max_entries: Option<usize>,
    codec: ValueCodec,
    state: RwLock<MemoryState>,
}

impl MemoryAdapter {
    // == Constructor ==
    /// Creates a memory adapter.
    ///
    /// Fails on an unknown serializer or a zero `max_entries`.
    pub fn new(options: MemoryOptions, serializers: &SerializerFactory) -> Result<Self> {
        if options.max_entries == Some(0) {
            return Err(StorageError::Configuration(
                "maxEntries must be greater than zero".to_string(),
            ));
        }
        let serializer = serializers.resolve(options.common.serializer.as_deref())?;

        Ok(Self {
            prefix: options.common.prefix_or(DEFAULT_PREFIX),
            default_ttl: options.common.default_ttl(),
            max_entries: options.max_entries,
            codec: ValueCodec::new(serializer),
            state: RwLock::new(MemoryState::default()),
        })
    }

    /// Number of stored entries, expired ones included until they are purged.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn store(&self, key: &str, value: &Value, expiry: Expiry) -> Result<bool> {
        let key = self.prefixed(key);
        if expiry == Expiry::Elapsed {
            self.state.write().remove(&key);
            return Ok(true);
        }
        let payload = self.codec.encode(value)?;

        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(max_entries) = self.max_entries {
            if !state.entries.contains_key(&key) && state.entries.len() >= max_entries {
                if let Some(evicted) = state.lru.evict_oldest() {
                    state.entries.remove(&evicted);
                    debug!(key = %evicted, "evicted least recently used entry");
                }
            }
            state.lru.touch(&key);
        }

        state
            .entries
            .insert(key.clone(), CacheEntry::new(key, payload, expiry.timestamp()));
        Ok(true)
    }
}

impl Adapter for MemoryAdapter {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = self.prefixed(key);

        // Unbounded live hits only need the read lock
        if self.max_entries.is_none() {
            let state = self.state.read();
            let live = match state.entries.get(&key) {
                None => return Ok(None),
                Some(entry) if entry.is_expired() => None,
                Some(entry) => Some(entry.value.clone()),
            };
            drop(state);
            if let Some(payload) = live {
                return Ok(self.codec.decode(&key, &payload));
            }
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        let payload = match state.entries.get(&key) {
            None => return Ok(None),
            Some(entry) if entry.is_expired() => None,
            Some(entry) => Some(entry.value.clone()),
        };
        let Some(payload) = payload else {
            state.remove(&key);
            debug!(key = %key, "dropped expired entry");
            return Ok(None);
        };
        if self.max_entries.is_some() {
            state.lru.touch(&key);
        }
        drop(guard);

        Ok(self.codec.decode(&key, &payload))
    }

    fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        self.store(key, value, Expiry::resolve(ttl, self.default_ttl))
    }

    fn set_forever(&self, key: &str, value: &Value) -> Result<bool> {
        self.store(key, value, Expiry::Never)
    }

    fn has(&self, key: &str) -> Result<bool> {
        let key = self.prefixed(key);
        let guard = self.state.upgradable_read();
        match guard.entries.get(&key).map(CacheEntry::is_expired) {
            None => Ok(false),
            Some(false) => Ok(true),
            Some(true) => {
                RwLockUpgradableReadGuard::upgrade(guard).remove(&key);
                Ok(false)
            }
        }
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let key = self.prefixed(key);
        let removed = self.state.write().remove(&key);
        Ok(removed.is_some_and(|entry| !entry.is_expired()))
    }

    fn clear(&self) -> Result<bool> {
        let mut state = self.state.write();
        state.entries.clear();
        state.lru.clear();
        Ok(true)
    }

    fn increment(&self, key: &str, by: i64) -> Result<Option<i64>> {
        let key = self.prefixed(key);
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(entry) = state.entries.get_mut(&key) else {
            return Ok(None);
        };
        if entry.is_expired() {
            state.remove(&key);
            return Ok(None);
        }
        let Some((updated, payload)) = self.codec.add_to_integer(&entry.value, by) else {
            debug!(key = %key, "increment on a non-integer value");
            return Ok(None);
        };
        entry.value = payload;
        if self.max_entries.is_some() {
            state.lru.touch(&key);
        }
        Ok(Some(updated))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let now = current_timestamp_ms();
        let state = self.state.read();
        let mut keys: Vec<String> = state
            .entries
            .values()
            .filter(|entry| !entry.is_expired_at(now))
            .filter_map(|entry| entry.key.strip_prefix(self.prefix.as_str()))
            .filter(|key| key.starts_with(prefix))
            .map(str::to_string)
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn purge_expired(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|entry| entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        Ok(expired.len())
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterOptions;
    use serde_json::json;
    use std::thread::sleep;

    fn adapter() -> MemoryAdapter {
        MemoryAdapter::new(MemoryOptions::default(), SerializerFactory::global()).unwrap()
    }

    fn bounded(max_entries: usize) -> MemoryAdapter {
        let options = MemoryOptions {
            max_entries: Some(max_entries),
            ..MemoryOptions::default()
        };
        MemoryAdapter::new(options, SerializerFactory::global()).unwrap()
    }

    #[test]
    fn test_get_missing_returns_default() {
        let adapter = adapter();
        assert_eq!(adapter.get_or("missing", json!("test")).unwrap(), json!("test"));
    }

    #[test]
    fn test_set_and_get() {
        let adapter = adapter();
        let value = json!({"name": "Phalcon", "year": 2012});

        assert!(adapter.set("key", &value, None).unwrap());
        assert_eq!(adapter.get("key").unwrap(), Some(value));
        assert_eq!(adapter.len(), 1);
    }

    #[test]
    fn test_overwrite() {
        let adapter = adapter();
        adapter.set("key", &json!("one"), None).unwrap();
        adapter.set("key", &json!("two"), None).unwrap();

        assert_eq!(adapter.get("key").unwrap(), Some(json!("two")));
        assert_eq!(adapter.len(), 1);
    }

    #[test]
    fn test_ttl_expiration_is_lazy() {
        let adapter = adapter();
        adapter
            .set("key", &json!("value"), Some(Duration::from_secs(1)))
            .unwrap();
        assert!(adapter.has("key").unwrap());

        sleep(Duration::from_millis(1100));

        // Still stored until touched
        assert_eq!(adapter.len(), 1);
        assert_eq!(adapter.get("key").unwrap(), None);
        assert_eq!(adapter.len(), 0);
    }

    #[test]
    fn test_has_purges_expired_entry() {
        let adapter = adapter();
        adapter
            .set("key", &json!(1), Some(Duration::from_millis(10)))
            .unwrap();
        sleep(Duration::from_millis(30));

        assert!(!adapter.has("key").unwrap());
        assert!(adapter.is_empty());
    }

    #[test]
    fn test_default_ttl_and_set_forever() {
        let options = MemoryOptions {
            common: AdapterOptions {
                default_ttl: Some(1),
                ..AdapterOptions::default()
            },
            ..MemoryOptions::default()
        };
        let adapter = MemoryAdapter::new(options, SerializerFactory::global()).unwrap();
        adapter.set("short", &json!("a"), None).unwrap();
        adapter.set_forever("long", &json!("b")).unwrap();

        sleep(Duration::from_millis(1100));

        assert!(!adapter.has("short").unwrap());
        assert!(adapter.has("long").unwrap());
    }

    #[test]
    fn test_zero_ttl_deletes() {
        let adapter = adapter();
        adapter.set("key", &json!("value"), None).unwrap();
        assert!(adapter.set("key", &json!("value"), Some(Duration::ZERO)).unwrap());
        assert!(!adapter.has("key").unwrap());
    }

    #[test]
    fn test_delete_twice() {
        let adapter = adapter();
        adapter.set("key", &json!("value"), None).unwrap();

        assert!(adapter.delete("key").unwrap());
        assert!(!adapter.delete("key").unwrap());
        assert!(!adapter.has("key").unwrap());
    }

    #[test]
    fn test_clear() {
        let adapter = adapter();
        adapter.set("a", &json!(1), None).unwrap();
        adapter.set("b", &json!(2), None).unwrap();

        assert!(adapter.clear().unwrap());
        assert!(!adapter.has("a").unwrap());
        assert!(!adapter.has("b").unwrap());
    }

    #[test]
    fn test_increment_and_decrement() {
        let adapter = adapter();
        adapter.set("counter", &json!(10), None).unwrap();

        assert_eq!(adapter.increment("counter", 5).unwrap(), Some(15));
        assert_eq!(adapter.decrement("counter", 20).unwrap(), Some(-5));
        assert_eq!(adapter.get("counter").unwrap(), Some(json!(-5)));
    }

    #[test]
    fn test_increment_missing_or_non_integer() {
        let adapter = adapter();
        adapter.set("text", &json!("abc"), None).unwrap();

        assert_eq!(adapter.increment("missing", 1).unwrap(), None);
        assert_eq!(adapter.increment("text", 1).unwrap(), None);
        assert_eq!(adapter.decrement("text", i64::MIN).unwrap(), None);
    }

    #[test]
    fn test_increment_keeps_expiry() {
        let adapter = adapter();
        adapter
            .set("counter", &json!(1), Some(Duration::from_millis(200)))
            .unwrap();
        adapter.increment("counter", 1).unwrap();
        sleep(Duration::from_millis(300));
        assert_eq!(adapter.get("counter").unwrap(), None);
    }

    #[test]
    fn test_keys_filters_prefix_and_expired() {
        let adapter = adapter();
        adapter.set("user:1", &json!("a"), None).unwrap();
        adapter.set("user:2", &json!("b"), None).unwrap();
        adapter.set("post:1", &json!("c"), None).unwrap();
        adapter
            .set("user:3", &json!("d"), Some(Duration::from_millis(10)))
            .unwrap();
        sleep(Duration::from_millis(30));

        assert_eq!(adapter.keys("user:").unwrap(), vec!["user:1", "user:2"]);
        assert_eq!(adapter.keys("").unwrap().len(), 3);
    }

    #[test]
    fn test_purge_expired() {
        let adapter = adapter();
        adapter
            .set("a", &json!(1), Some(Duration::from_millis(10)))
            .unwrap();
        adapter.set("b", &json!(2), None).unwrap();
        sleep(Duration::from_millis(30));

        assert_eq!(adapter.purge_expired().unwrap(), 1);
        assert_eq!(adapter.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let adapter = bounded(3);
        adapter.set("key1", &json!(1), None).unwrap();
        adapter.set("key2", &json!(2), None).unwrap();
        adapter.set("key3", &json!(3), None).unwrap();

        // key1 becomes most recently used
        adapter.get("key1").unwrap();
        adapter.set("key4", &json!(4), None).unwrap();

        assert_eq!(adapter.len(), 3);
        assert!(adapter.has("key1").unwrap());
        assert!(!adapter.has("key2").unwrap());
        assert!(adapter.has("key4").unwrap());
    }

    #[test]
    fn test_increment_refreshes_recency() {
        let adapter = bounded(2);
        adapter.set("hits", &json!(1), None).unwrap();
        adapter.set("other", &json!(2), None).unwrap();

        adapter.increment("hits", 1).unwrap();
        adapter.set("third", &json!(3), None).unwrap();

        assert_eq!(adapter.get("hits").unwrap(), Some(json!(2)));
        assert!(!adapter.has("other").unwrap());
    }

    #[test]
    fn test_unbounded_get_shares_read_lock() {
        let adapter = adapter();
        adapter.set("key", &json!("value"), None).unwrap();

        let _reader = adapter.state.read();
        assert_eq!(adapter.get("key").unwrap(), Some(json!("value")));
        assert_eq!(adapter.get("missing").unwrap(), None);
    }

    #[test]
    fn test_none_serializer_keeps_digit_strings() {
        let options = MemoryOptions {
            common: AdapterOptions {
                serializer: Some("none".to_string()),
                ..AdapterOptions::default()
            },
            ..MemoryOptions::default()
        };
        let adapter = MemoryAdapter::new(options, SerializerFactory::global()).unwrap();

        adapter.set("k", &json!("7"), None).unwrap();
        assert_eq!(adapter.get("k").unwrap(), Some(json!("7")));
        assert_eq!(adapter.increment("k", 1).unwrap(), None);
        assert_eq!(adapter.get("k").unwrap(), Some(json!("7")));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let options = MemoryOptions {
            max_entries: Some(0),
            ..MemoryOptions::default()
        };
        let result = MemoryAdapter::new(options, SerializerFactory::global());
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[test]
    fn test_unknown_serializer_rejected() {
        let options = MemoryOptions {
            common: AdapterOptions {
                serializer: Some("php".to_string()),
                ..AdapterOptions::default()
            },
            ..MemoryOptions::default()
        };
        let result = MemoryAdapter::new(options, SerializerFactory::global());
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }

    #[test]
    fn test_serializer_rejection_is_error() {
        let options = MemoryOptions {
            common: AdapterOptions {
                serializer: Some("base64".to_string()),
                ..AdapterOptions::default()
            },
            ..MemoryOptions::default()
        };
        let adapter = MemoryAdapter::new(options, SerializerFactory::global()).unwrap();
        let result = adapter.set("key", &json!([1, 2, 3]), None);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }

    #[test]
    fn test_prefix_applies() {
        let adapter = adapter();
        assert_eq!(adapter.prefix(), DEFAULT_PREFIX);
        adapter.set("key", &json!(1), None).unwrap();
        assert_eq!(adapter.keys("").unwrap(), vec!["key"]);
    }
}
