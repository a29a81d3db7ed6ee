//! Stream Adapter
//!
//! One file per key under a sharded directory tree. The file path comes from
//! the SHA-256 of the key, so any key is safe to use on disk:
//!
//! ```text
//! <storage_dir>/<prefix>/ab/cd/abcd...(64 hex chars)
//! ```
//!
//! File layout is a one-line header followed by the key and the payload:
//!
//! ```text
//! <expires_at_ms | -> <key_len>\n<key><payload>
//! ```
//!
//! Writes go to a temp file in the same directory which is then renamed over
//! the target, so readers see either the old or the new file, never a partial one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::codec::ValueCodec;
use super::entry::{current_timestamp_ms, CacheEntry, Expiry};
use super::options::StreamOptions;
use super::Adapter;
use crate::error::{Result, StorageError};
use crate::serializer::SerializerFactory;

/// Directory name under `storage_dir` used when no prefix is configured.
pub const DEFAULT_PREFIX: &str = "kvstash";

/// Longest header line accepted before the file is considered corrupt.
const MAX_HEADER_LEN: usize = 48;

// == Stream Adapter ==
#[derive(Debug)]
pub struct StreamAdapter {
    root: PathBuf,
    prefix: String,
    default_ttl: Option<Duration>,
    codec: ValueCodec,
}

impl StreamAdapter {
    // == Constructor ==
    /// Creates a filesystem adapter. Nothing is created on disk until the first write.
    pub fn new(options: StreamOptions, serializers: &SerializerFactory) -> Result<Self> {
        if options.storage_dir.as_os_str().is_empty() {
            return Err(StorageError::Configuration(
                "the 'storageDir' option must be specified".to_string(),
            ));
        }
        let prefix = options.common.prefix_or(DEFAULT_PREFIX);
        if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix == "." || prefix == ".." {
            return Err(StorageError::Configuration(format!(
                "invalid stream prefix '{}'",
                prefix
            )));
        }
        let serializer = serializers.resolve(options.common.serializer.as_deref())?;
        let codec = ValueCodec::new(serializer);

        let root = options.storage_dir.join(&prefix);
        debug!(root = %root.display(), serializer = codec.serializer_name(), "stream adapter ready");

        Ok(Self {
            root,
            prefix,
            default_ttl: options.common.default_ttl(),
            codec,
        })
    }

    /// Directory holding every file of this adapter.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the file backing `key`.
    pub fn file_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root
            .join(&digest[..2])
            .join(&digest[2..4])
            .join(digest)
    }

    // == Reading ==
    /// Reads the live entry for `key`, removing the file if it has expired.
    fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        let path = self.file_path(key);
        let entry = read_file(&path)?;

        if entry.key != key {
            debug!(path = %path.display(), "file belongs to a different key");
            return None;
        }
        if entry.is_expired() {
            remove_quietly(&path);
            return None;
        }
        Some(entry)
    }

    // == Writing ==
    fn write_entry(&self, entry: &CacheEntry) -> bool {
        let path = self.file_path(&entry.key);
        match write_atomic(&path, &encode_file(entry)) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to write cache file");
                false
            }
        }
    }

    fn store(&self, key: &str, value: &Value, expiry: Expiry) -> Result<bool> {
        if expiry == Expiry::Elapsed {
            self.delete(key)?;
            return Ok(true);
        }
        let payload = self.codec.encode(value)?;
        Ok(self.write_entry(&CacheEntry::new(key, payload, expiry.timestamp())))
    }

    /// Every cache file currently under the root.
    fn cache_files(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(3)
            .max_depth(3)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file() && is_cache_file_name(entry.path()))
            .map(walkdir::DirEntry::into_path)
    }
}

impl Adapter for StreamAdapter {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .read_entry(key)
            .and_then(|entry| self.codec.decode(key, &entry.value)))
    }

    fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        self.store(key, value, Expiry::resolve(ttl, self.default_ttl))
    }

    fn set_forever(&self, key: &str, value: &Value) -> Result<bool> {
        self.store(key, value, Expiry::Never)
    }

    fn has(&self, key: &str) -> Result<bool> {
        Ok(self.read_entry(key).is_some())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.file_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to delete cache file");
                Err(StorageError::io(&path, err))
            }
        }
    }

    fn clear(&self) -> Result<bool> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(StorageError::io(&self.root, err)),
        }
    }

    fn increment(&self, key: &str, by: i64) -> Result<Option<i64>> {
        let Some(mut entry) = self.read_entry(key) else {
            return Ok(None);
        };
        let Some((updated, payload)) = self.codec.add_to_integer(&entry.value, by) else {
            debug!(key, "increment on a non-integer value");
            return Ok(None);
        };
        entry.value = payload;
        Ok(self.write_entry(&entry).then_some(updated))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let now = current_timestamp_ms();
        let mut keys: Vec<String> = self
            .cache_files()
            .filter_map(|path| read_file(&path))
            .filter(|entry| !entry.is_expired_at(now) && entry.key.starts_with(prefix))
            .map(|entry| entry.key)
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn purge_expired(&self) -> Result<usize> {
        let now = current_timestamp_ms();
        let mut removed = 0;
        for path in self.cache_files() {
            if read_file(&path).is_some_and(|entry| entry.is_expired_at(now))
                && fs::remove_file(&path).is_ok()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

// == File Format ==
fn encode_file(entry: &CacheEntry) -> Vec<u8> {
    let expires = entry
        .expires_at
        .map_or_else(|| "-".to_string(), |at| at.to_string());
    let header = format!("{} {}\n", expires, entry.key.len());

    let mut bytes = Vec::with_capacity(header.len() + entry.key.len() + entry.value.len());
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(entry.key.as_bytes());
    bytes.extend_from_slice(&entry.value);
    bytes
}

/// Parses a cache file. Any malformed input yields `None`.
fn decode_file(bytes: &[u8]) -> Option<CacheEntry> {
    let newline = bytes
        .iter()
        .take(MAX_HEADER_LEN)
        .position(|&b| b == b'\n')?;
    let header = std::str::from_utf8(&bytes[..newline]).ok()?;
    let (expires, key_len) = header.split_once(' ')?;

    let expires_at = match expires {
        "-" => None,
        at => Some(at.parse::<i64>().ok()?),
    };
    let key_len: usize = key_len.parse().ok()?;

    let body = &bytes[newline + 1..];
    if body.len() < key_len {
        return None;
    }
    let (key, value) = body.split_at(key_len);
    let key = std::str::from_utf8(key).ok()?;

    Some(CacheEntry::new(key, value.to_vec(), expires_at))
}

fn read_file(path: &Path) -> Option<CacheEntry> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read cache file");
            return None;
        }
    };
    let entry = decode_file(&bytes);
    if entry.is_none() {
        debug!(path = %path.display(), "ignoring malformed cache file");
    }
    entry
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "cache path has no parent"))?;
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_data()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            debug!(path = %path.display(), error = %err, "could not remove expired cache file");
        }
    }
}

/// Cache files are named by a 64-char hex digest; anything else (temp files) is skipped.
fn is_cache_file_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() == 64 && name.bytes().all(|b| b.is_ascii_hexdigit()))
}
