//! Adapter Factory
//!
//! Builds the backend named by an [`AdapterConfig`].

use std::sync::Arc;

use tracing::info;

use super::options::AdapterConfig;
use super::{Adapter, MemoryAdapter, RedisAdapter, StreamAdapter};
use crate::error::Result;
use crate::serializer::SerializerFactory;

// == Adapter Factory ==
#[derive(Debug, Clone)]
pub struct AdapterFactory {
    serializers: SerializerFactory,
}

impl AdapterFactory {
    /// Creates a factory resolving serializers through `serializers`.
    pub fn new(serializers: SerializerFactory) -> Self {
        Self { serializers }
    }

    /// Constructs the configured adapter.
    ///
    /// Configuration problems (unknown serializer, missing storage directory,
    /// bad host) fail here. Connection problems surface on first use.
    pub fn new_instance(&self, config: &AdapterConfig) -> Result<Arc<dyn Adapter>> {
        let adapter: Arc<dyn Adapter> = match config {
            AdapterConfig::Memory(options) => {
                Arc::new(MemoryAdapter::new(options.clone(), &self.serializers)?)
            }
            AdapterConfig::Stream(options) => {
                Arc::new(StreamAdapter::new(options.clone(), &self.serializers)?)
            }
            AdapterConfig::Redis(options) => {
                Arc::new(RedisAdapter::new(options.clone(), &self.serializers)?)
            }
        };
        info!(adapter = config.kind(), prefix = adapter.prefix(), "storage adapter created");
        Ok(adapter)
    }

    pub fn serializers(&self) -> &SerializerFactory {
        &self.serializers
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new(SerializerFactory::global().clone())
    }
}
