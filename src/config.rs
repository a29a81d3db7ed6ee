//! Configuration Module
//!
//! Loads the server and adapter configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::adapter::{
    AdapterConfig, AdapterOptions, MemoryOptions, RedisAuth, RedisOptions, StreamOptions,
};
use crate::error::{Result, StorageError};

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend the server stores into
    pub adapter: AdapterConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Expired-entry reaper interval in seconds, 0 disables it
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a Config from environment variables.
    ///
    /// # Environment Variables
    /// - `STORAGE_CONFIG` - Full adapter config as JSON; overrides the variables below
    /// - `STORAGE_ADAPTER` - `memory`, `stream` or `redis` (default: memory)
    /// - `STORAGE_PREFIX` - Key namespace (default: per adapter)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: none, entries never expire)
    /// - `SERIALIZER` - Serializer name (default: msgpack)
    /// - `MAX_ENTRIES` - Memory adapter capacity (default: unbounded)
    /// - `STORAGE_DIR` - Stream adapter root (default: ./storage)
    /// - `REDIS_HOST`, `REDIS_PORT`, `REDIS_INDEX`, `REDIS_AUTH` - Redis connection
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Reaper interval in seconds (default: 60)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let adapter = match lookup("STORAGE_CONFIG") {
            Some(json) => AdapterConfig::from_json(&json)?,
            None => adapter_from_lookup(&lookup)?,
        };

        Ok(Self {
            adapter,
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            cleanup_interval: parse_or(&lookup, "CLEANUP_INTERVAL", 60)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            adapter: AdapterConfig::Memory(MemoryOptions::default()),
            server_port: 3000,
            cleanup_interval: 60,
        }
    }
}

fn adapter_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<AdapterConfig> {
    let common = AdapterOptions {
        prefix: lookup("STORAGE_PREFIX"),
        default_ttl: parse(lookup, "DEFAULT_TTL")?,
        serializer: lookup("SERIALIZER"),
    };

    let kind = lookup("STORAGE_ADAPTER").unwrap_or_else(|| "memory".to_string());
    match kind.to_ascii_lowercase().as_str() {
        "memory" => Ok(AdapterConfig::Memory(MemoryOptions {
            common,
            max_entries: parse(lookup, "MAX_ENTRIES")?,
        })),
        "stream" => Ok(AdapterConfig::Stream(StreamOptions {
            common,
            storage_dir: lookup("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("storage")),
        })),
        "redis" => {
            let defaults = RedisOptions::default();
            Ok(AdapterConfig::Redis(RedisOptions {
                common,
                host: lookup("REDIS_HOST").unwrap_or(defaults.host),
                port: parse_or(lookup, "REDIS_PORT", defaults.port)?,
                index: parse_or(lookup, "REDIS_INDEX", defaults.index)?,
                auth: lookup("REDIS_AUTH").map(RedisAuth::Password),
                ..defaults
            }))
        }
        other => Err(StorageError::Configuration(format!(
            "unknown storage adapter '{}'",
            other
        ))),
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>> {
    lookup(name)
        .map(|raw| {
            raw.trim().parse().map_err(|_| {
                StorageError::Configuration(format!("{} has an invalid value '{}'", name, raw))
            })
        })
        .transpose()
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    Ok(parse(lookup, name)?.unwrap_or(default))
}
