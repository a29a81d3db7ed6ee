//! Adapter contract tests
//!
//! Every adapter built through the factory must behave the same way for
//! the public operations, whatever serializer it uses.

use std::fs;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use kvstash::adapter::{AdapterConfig, AdapterOptions, MemoryOptions, StreamAdapter, StreamOptions};
use kvstash::serializer::SerializerFactory;
use kvstash::{Adapter, AdapterFactory, StorageError};
use serde_json::{json, Value};
use tempfile::TempDir;

// == Helper Functions ==

fn common(serializer: &str) -> AdapterOptions {
    AdapterOptions {
        serializer: Some(serializer.to_string()),
        ..AdapterOptions::default()
    }
}

/// Memory and stream adapters for `serializer`. The TempDir must outlive them.
fn adapters(serializer: &str) -> (TempDir, Vec<Arc<dyn Adapter>>) {
    let dir = TempDir::new().unwrap();
    let factory = AdapterFactory::default();
    let memory = factory
        .new_instance(&AdapterConfig::Memory(MemoryOptions {
            common: common(serializer),
            max_entries: None,
        }))
        .unwrap();
    let stream = factory
        .new_instance(&AdapterConfig::Stream(StreamOptions {
            common: common(serializer),
            storage_dir: dir.path().to_path_buf(),
        }))
        .unwrap();
    (dir, vec![memory, stream])
}

fn structured_value() -> Value {
    json!({"name": "kvstash", "list": [1, 2.5, null, "x"], "flag": false})
}

// == Round trips ==

#[test]
fn test_structured_round_trip_per_serializer() {
    for serializer in ["json", "msgpack"] {
        let (_dir, adapters) = adapters(serializer);
        for adapter in adapters {
            assert!(adapter.set("doc", &structured_value(), None).unwrap());
            assert_eq!(adapter.get("doc").unwrap(), Some(structured_value()), "{serializer}");
        }
    }
}

#[test]
fn test_string_serializers_round_trip() {
    for serializer in ["base64", "none"] {
        let (_dir, adapters) = adapters(serializer);
        for adapter in adapters {
            assert!(adapter.set("text", &json!("Phalcon Framework"), None).unwrap());
            assert_eq!(adapter.get("text").unwrap(), Some(json!("Phalcon Framework")));
        }
    }
}

#[test]
fn test_text_serializers_keep_lookalike_strings() {
    for (serializer, text) in [("none", "42"), ("none", "-7"), ("base64", "\u{3374}"), ("base64", "42")] {
        let (_dir, adapters) = adapters(serializer);
        for adapter in adapters {
            adapter.set("text", &json!(text), None).unwrap();
            assert_eq!(adapter.get("text").unwrap(), Some(json!(text)), "{serializer} {text:?}");
            assert_eq!(adapter.increment("text", 1).unwrap(), None);
            assert_eq!(adapter.get("text").unwrap(), Some(json!(text)));
        }
    }
}

#[test]
fn test_text_serializers_reject_integers() {
    for serializer in ["none", "base64"] {
        let (_dir, adapters) = adapters(serializer);
        for adapter in adapters {
            let err = adapter.set("counter", &json!(42), None).unwrap_err();
            assert!(matches!(err, StorageError::Serialization(_)), "{serializer}");
            assert!(!adapter.has("counter").unwrap());
        }
    }
}

#[test]
fn test_string_serializer_rejects_structured_value() {
    let (_dir, adapters) = adapters("base64");
    for adapter in adapters {
        let err = adapter.set("doc", &structured_value(), None).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
        assert!(!adapter.has("doc").unwrap());
    }
}

// == Misses ==

#[test]
fn test_unknown_key_returns_default() {
    let (_dir, adapters) = adapters("msgpack");
    for adapter in adapters {
        assert_eq!(adapter.get("unknown").unwrap(), None);
        assert_eq!(adapter.get_or("unknown", json!("default")).unwrap(), json!("default"));
        assert!(!adapter.has("unknown").unwrap());
    }
}

#[test]
fn test_expired_entry_returns_default() {
    let (_dir, adapters) = adapters("json");
    for adapter in &adapters {
        adapter
            .set("ttl", &json!("value"), Some(Duration::from_secs(1)))
            .unwrap();
        assert!(adapter.has("ttl").unwrap());
    }

    sleep(Duration::from_secs(2));

    for adapter in &adapters {
        assert_eq!(adapter.get_or("ttl", json!("default")).unwrap(), json!("default"));
        assert!(!adapter.has("ttl").unwrap());
        assert!(adapter.keys("").unwrap().is_empty());
    }
}

#[test]
fn test_corrupt_stream_file_returns_default() {
    let dir = TempDir::new().unwrap();
    let options = StreamOptions {
        storage_dir: dir.path().to_path_buf(),
        ..StreamOptions::default()
    };
    let adapter = StreamAdapter::new(options, SerializerFactory::global()).unwrap();

    adapter.set("corrupt", &json!("value"), None).unwrap();
    fs::write(adapter.file_path("corrupt"), "{").unwrap();

    assert_eq!(adapter.get_or("corrupt", json!("default")).unwrap(), json!("default"));
}

// == Lifecycle ==

#[test]
fn test_zero_ttl_deletes() {
    let (_dir, adapters) = adapters("msgpack");
    for adapter in adapters {
        adapter.set("key", &json!(1), None).unwrap();
        assert!(adapter.set("key", &json!(2), Some(Duration::ZERO)).unwrap());
        assert!(!adapter.has("key").unwrap());
    }
}

#[test]
fn test_delete_twice() {
    let (_dir, adapters) = adapters("msgpack");
    for adapter in adapters {
        adapter.set("key", &json!("value"), None).unwrap();
        assert!(adapter.delete("key").unwrap());
        assert!(!adapter.delete("key").unwrap());
    }
}

#[test]
fn test_clear_then_has() {
    let (_dir, adapters) = adapters("msgpack");
    for adapter in adapters {
        adapter.set("key-1", &json!(1), None).unwrap();
        adapter.set("key-2", &json!(2), None).unwrap();

        assert!(adapter.clear().unwrap());
        assert!(!adapter.has("key-1").unwrap());
        assert!(!adapter.has("key-2").unwrap());
        assert!(adapter.keys("").unwrap().is_empty());
    }
}

#[test]
fn test_default_ttl_and_set_forever() {
    let dir = TempDir::new().unwrap();
    let short = AdapterOptions {
        default_ttl: Some(1),
        ..AdapterOptions::default()
    };
    let factory = AdapterFactory::default();
    let adapters = [
        factory
            .new_instance(&AdapterConfig::Memory(MemoryOptions {
                common: short.clone(),
                max_entries: None,
            }))
            .unwrap(),
        factory
            .new_instance(&AdapterConfig::Stream(StreamOptions {
                common: short,
                storage_dir: dir.path().to_path_buf(),
            }))
            .unwrap(),
    ];

    for adapter in &adapters {
        adapter.set("defaulted", &json!(1), None).unwrap();
        adapter.set_forever("forever", &json!(2)).unwrap();
    }

    sleep(Duration::from_secs(2));

    for adapter in &adapters {
        assert!(!adapter.has("defaulted").unwrap());
        assert_eq!(adapter.get("forever").unwrap(), Some(json!(2)));
    }
}

// == Counters and listing ==

#[test]
fn test_increment_decrement() {
    for serializer in ["json", "msgpack"] {
        let (_dir, adapters) = adapters(serializer);
        for adapter in adapters {
            adapter.set("counter", &json!(1), None).unwrap();
            assert_eq!(adapter.increment("counter", 1).unwrap(), Some(2));
            assert_eq!(adapter.increment("counter", 10).unwrap(), Some(12));
            assert_eq!(adapter.decrement("counter", 2).unwrap(), Some(10));
            assert_eq!(adapter.get("counter").unwrap(), Some(json!(10)));

            assert_eq!(adapter.increment("missing", 1).unwrap(), None);
            assert!(!adapter.has("missing").unwrap());
        }
    }
}

#[test]
fn test_keys_strip_adapter_prefix() {
    let (_dir, adapters) = adapters("msgpack");
    for adapter in adapters {
        for key in ["b:2", "a:1", "a:2"] {
            adapter.set(key, &json!(key), None).unwrap();
        }
        assert_eq!(adapter.keys("a:").unwrap(), vec!["a:1", "a:2"]);
        assert_eq!(adapter.keys("").unwrap(), vec!["a:1", "a:2", "b:2"]);
    }
}

#[test]
fn test_purge_expired_counts_entries() {
    let (_dir, adapters) = adapters("msgpack");
    for adapter in &adapters {
        adapter
            .set("short", &json!(1), Some(Duration::from_millis(50)))
            .unwrap();
        adapter.set("long", &json!(2), None).unwrap();
    }

    sleep(Duration::from_millis(200));

    for adapter in &adapters {
        assert_eq!(adapter.purge_expired().unwrap(), 1);
        assert_eq!(adapter.keys("").unwrap(), vec!["long"]);
    }
}
