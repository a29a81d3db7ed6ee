//! Serializer Factory
//!
//! Registry of serializer strategies by name. Built once, read-only afterwards.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{Result, StorageError};

use super::{Base64Serializer, JsonSerializer, MsgpackSerializer, NoneSerializer, Serializer};

/// Name of the strategy used when an adapter does not pick one.
pub const DEFAULT_SERIALIZER: &str = "msgpack";

static GLOBAL: OnceLock<SerializerFactory> = OnceLock::new();

// == Serializer Factory ==
/// Resolves serializers by name.
#[derive(Debug, Clone)]
pub struct SerializerFactory {
    registry: HashMap<String, Arc<dyn Serializer>>,
}

impl SerializerFactory {
    // == Constructor ==
    /// Creates a factory holding the built-in strategies.
    pub fn new() -> Self {
        Self::empty()
            .with_serializer(Arc::new(MsgpackSerializer))
            .with_serializer(Arc::new(JsonSerializer))
            .with_serializer(Arc::new(Base64Serializer))
            .with_serializer(Arc::new(NoneSerializer))
    }

    /// Creates a factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            registry: HashMap::new(),
        }
    }

    /// Registers a strategy under its own name, replacing any previous one.
    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.registry
            .insert(serializer.name().to_string(), serializer);
        self
    }

    /// Process-wide factory with the built-in strategies.
    pub fn global() -> &'static SerializerFactory {
        GLOBAL.get_or_init(SerializerFactory::new)
    }

    // == Lookup ==
    /// Returns the serializer registered under `name`.
    ///
    /// Unknown names are a configuration error.
    pub fn new_instance(&self, name: &str) -> Result<Arc<dyn Serializer>> {
        self.registry
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| {
                StorageError::Configuration(format!("unknown serializer '{}'", name))
            })
    }

    /// Returns the serializer for `name`, or the default strategy when `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn Serializer>> {
        self.new_instance(name.unwrap_or(DEFAULT_SERIALIZER))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for SerializerFactory {
    fn default() -> Self {
        Self::new()
    }
}
