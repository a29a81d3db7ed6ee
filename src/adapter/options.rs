//! Adapter configuration.
//!
//! Every type here deserializes with serde, so adapter setups can be loaded
//! from JSON as well as built in code.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};

/// Options shared by every adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterOptions {
    /// Namespace applied to every key. Each adapter has its own default.
    #[serde(default)]
    pub prefix: Option<String>,
    /// TTL in seconds for writes that do not pass one. None = never expire.
    #[serde(default, alias = "lifetime")]
    pub default_ttl: Option<u64>,
    /// Serializer name, resolved through the serializer factory.
    #[serde(default, alias = "defaultSerializer")]
    pub serializer: Option<String>,
}

impl AdapterOptions {
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl.map(Duration::from_secs)
    }

    pub(crate) fn prefix_or(&self, fallback: &str) -> String {
        self.prefix.clone().unwrap_or_else(|| fallback.to_string())
    }
}

// == Memory ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryOptions {
    #[serde(flatten)]
    pub common: AdapterOptions,
    /// Capacity bound; the least recently used key is evicted beyond it.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

// == Stream ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamOptions {
    #[serde(flatten)]
    pub common: AdapterOptions,
    /// Root directory for cache files. Required.
    #[serde(default)]
    pub storage_dir: PathBuf,
}

// == Redis ==
/// Credentials sent with `AUTH`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RedisAuth {
    /// `AUTH password`
    Password(String),
    /// `AUTH username password`
    UserPassword(String, String),
}

/// TLS settings for the Redis transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslOptions {
    /// Force TLS even when the host has no `tls://` scheme
    #[serde(default)]
    pub enabled: bool,
    /// Verify the server certificate
    #[serde(default = "default_verify_peer")]
    pub verify_peer: bool,
    /// Name the certificate must be valid for; must match the host
    #[serde(default)]
    pub verify_peer_name: Option<String>,
}

fn default_verify_peer() -> bool {
    true
}

impl Default for SslOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            verify_peer: true,
            verify_peer_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisOptions {
    #[serde(flatten)]
    pub common: AdapterOptions,
    /// Host name or address, optionally with a `tls://` / `ssl://` / `tcp://` scheme
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Logical database selected after connecting
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub auth: Option<RedisAuth>,
    #[serde(default)]
    pub ssl: Option<SslOptions>,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Socket read and write timeout in milliseconds, None = block until the server answers
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            common: AdapterOptions::default(),
            host: default_host(),
            port: default_port(),
            index: 0,
            auth: None,
            ssl: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: None,
        }
    }
}

// == Adapter Config ==
/// Selects and configures one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "adapter", rename_all = "lowercase")]
pub enum AdapterConfig {
    Memory(MemoryOptions),
    Stream(StreamOptions),
    Redis(RedisOptions),
}

impl AdapterConfig {
    /// Parses a configuration document such as
    /// `{"adapter": "stream", "storageDir": "/tmp/cache", "defaultTtl": 60}`.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| StorageError::Configuration(e.to_string()))
    }

    /// Backend name as used in the `adapter` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AdapterConfig::Memory(_) => "memory",
            AdapterConfig::Stream(_) => "stream",
            AdapterConfig::Redis(_) => "redis",
        }
    }

    pub fn common(&self) -> &AdapterOptions {
        match self {
            AdapterConfig::Memory(o) => &o.common,
            AdapterConfig::Stream(o) => &o.common,
            AdapterConfig::Redis(o) => &o.common,
        }
    }
}
