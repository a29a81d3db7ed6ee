//! Redis Adapter
//!
//! Keeps one lazily-opened connection behind a mutex. Connecting runs the
//! transport handshake, then `AUTH`, then `SELECT`, so each failure maps to
//! its own error. Expiry is handed to Redis via `PX`.

use std::fmt;
use std::time::Duration;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use redis::{Connection, RedisError, RedisResult, Script};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::codec::ValueCodec;
use super::entry::{current_timestamp_ms, Expiry};
use super::options::{RedisAuth, RedisOptions};
use super::Adapter;
use crate::error::{Result, StorageError};
use crate::serializer::SerializerFactory;

/// Key prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "kvstash:";

const SCAN_BATCH: usize = 256;

const INCREMENT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('INCRBY', KEYS[1], ARGV[1])
end
return false
";

// == Redis Adapter ==
pub struct RedisAdapter {
    url: String,
    host: String,
    port: u16,
    index: i64,
    auth: Option<RedisAuth>,
    /// Verified peer name that differs from `host`
    peer_name: Option<String>,
    connect_timeout: Duration,
    /// Socket read and write timeout
    io_timeout: Option<Duration>,
    prefix: String,
    default_ttl: Option<Duration>,
    codec: ValueCodec,
    increment: Script,
    connection: Mutex<Option<Connection>>,
}

impl fmt::Debug for RedisAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisAdapter")
            .field("url", &self.url)
            .field("index", &self.index)
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .field("codec", &self.codec)
            .field("connected", &self.connection.try_lock().map(|c| c.is_some()))
            .finish_non_exhaustive()
    }
}

impl RedisAdapter {
    // == Constructor ==
    /// Creates a Redis adapter. No connection is made until the first operation.
    pub fn new(options: RedisOptions, serializers: &SerializerFactory) -> Result<Self> {
        let serializer = serializers.resolve(options.common.serializer.as_deref())?;
        let ssl = options.ssl.clone().unwrap_or_default();

        let (scheme_tls, host) = split_scheme(&options.host)?;
        if host.is_empty() {
            return Err(StorageError::Configuration(
                "the Redis host must not be empty".to_string(),
            ));
        }
        let tls = scheme_tls || ssl.enabled;
        let url = connection_url(host, options.port, tls, ssl.verify_peer);
        // The certificate is checked against the connected host name
        let peer_name = ssl
            .verify_peer_name
            .filter(|name| tls && ssl.verify_peer && name != host);

        Ok(Self {
            url,
            host: host.to_string(),
            port: options.port,
            index: options.index,
            auth: options.auth,
            peer_name,
            connect_timeout: Duration::from_millis(options.connect_timeout_ms.max(1)),
            io_timeout: options.read_timeout_ms.map(Duration::from_millis),
            prefix: options.common.prefix_or(DEFAULT_PREFIX),
            default_ttl: options.common.default_ttl(),
            codec: ValueCodec::new(serializer),
            increment: Script::new(INCREMENT_SCRIPT),
            connection: Mutex::new(None),
        })
    }

    // == Connection ==
    /// Returns the live connection, connecting first if needed.
    ///
    /// The guard holds the adapter's connection lock; drop it before calling
    /// other adapter methods.
    pub fn connection(&self) -> Result<MappedMutexGuard<'_, Connection>> {
        let mut guard = self.connection.lock();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| StorageError::Connection("connection unavailable".to_string()))
    }

    /// Whether a connection is currently cached.
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(peer_name) = &self.peer_name {
            warn!(host = %self.host, peer_name = %peer_name, "TLS peer name does not match host");
            return Err(StorageError::Connection(format!(
                "certificate for '{}' cannot be verified as '{}'",
                self.host, peer_name
            )));
        }

        let client = redis::Client::open(self.url.as_str())
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let mut conn = client
            .get_connection_with_timeout(self.connect_timeout)
            .map_err(|err| {
                warn!(host = %self.host, port = self.port, error = %err, "Redis connection failed");
                StorageError::Connection(err.to_string())
            })?;
        conn.set_read_timeout(self.io_timeout)
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        conn.set_write_timeout(self.io_timeout)
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        if let Some(auth) = &self.auth {
            let mut cmd = redis::cmd("AUTH");
            match auth {
                RedisAuth::Password(password) => {
                    cmd.arg(password);
                }
                RedisAuth::UserPassword(user, password) => {
                    cmd.arg(user).arg(password);
                }
            }
            cmd.query::<()>(&mut conn).map_err(|err| {
                if is_transport_failure(&err) {
                    return StorageError::Connection(err.to_string());
                }
                warn!(host = %self.host, error = %err, "Redis authentication failed");
                StorageError::Authentication
            })?;
        }

        if self.index != 0 {
            redis::cmd("SELECT")
                .arg(self.index)
                .query::<()>(&mut conn)
                .map_err(|err| {
                    if is_transport_failure(&err) {
                        return StorageError::Connection(err.to_string());
                    }
                    warn!(index = self.index, error = %err, "Redis database selection failed");
                    StorageError::SelectDatabase
                })?;
        }

        info!(host = %self.host, port = self.port, index = self.index, "connected to Redis");
        Ok(conn)
    }

    /// Runs `op` on the cached connection. A transport failure drops the
    /// connection so the next call reconnects.
    fn run<T>(&self, op: impl FnOnce(&mut Connection) -> RedisResult<T>) -> Result<T> {
        let mut guard = self.connection.lock();
        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(StorageError::Connection("connection unavailable".to_string()));
        };

        match op(conn) {
            Ok(value) => Ok(value),
            Err(err) if is_transport_failure(&err) => {
                *guard = None;
                Err(StorageError::Connection(err.to_string()))
            }
            Err(err) => Err(StorageError::Backend(err.to_string())),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn store(&self, key: &str, value: &Value, expiry: Expiry) -> Result<bool> {
        let expires_in = match expiry {
            Expiry::Elapsed => {
                self.delete(key)?;
                return Ok(true);
            }
            Expiry::Never => None,
            Expiry::At(at) => Some(at.saturating_sub(current_timestamp_ms()).max(1)),
        };
        let payload = self.codec.encode(value)?;
        let key = self.prefixed(key);

        self.run(|conn| {
            let mut cmd = redis::cmd("SET");
            cmd.arg(&key).arg(payload);
            if let Some(millis) = expires_in {
                cmd.arg("PX").arg(millis);
            }
            soften(&key, cmd.query::<()>(conn).map(|()| true))
        })
    }

    /// Raw keys matching `pattern`, collected with `SCAN`.
    fn scan(conn: &mut Connection, pattern: &str) -> RedisResult<Vec<Vec<u8>>> {
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query(conn)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

impl Adapter for RedisAdapter {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = self.prefixed(key);
        let payload = self.run(|conn| {
            soften(
                &key,
                redis::cmd("GET").arg(&key).query::<Option<Vec<u8>>>(conn),
            )
        })?;
        Ok(payload.and_then(|bytes| self.codec.decode(&key, &bytes)))
    }

    fn set(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<bool> {
        self.store(key, value, Expiry::resolve(ttl, self.default_ttl))
    }

    fn set_forever(&self, key: &str, value: &Value) -> Result<bool> {
        self.store(key, value, Expiry::Never)
    }

    fn has(&self, key: &str) -> Result<bool> {
        let key = self.prefixed(key);
        self.run(|conn| {
            soften(
                &key,
                redis::cmd("EXISTS").arg(&key).query::<i64>(conn).map(|n| n > 0),
            )
        })
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let key = self.prefixed(key);
        self.run(|conn| {
            soften(
                &key,
                redis::cmd("DEL").arg(&key).query::<i64>(conn).map(|n| n > 0),
            )
        })
    }

    fn clear(&self) -> Result<bool> {
        let pattern = format!("{}*", escape_pattern(&self.prefix));
        self.run(|conn| {
            let keys = Self::scan(conn, &pattern)?;
            for chunk in keys.chunks(SCAN_BATCH) {
                redis::cmd("DEL").arg(chunk).query::<i64>(conn)?;
            }
            debug!(removed = keys.len(), "cleared Redis namespace");
            Ok(true)
        })
    }

    fn increment(&self, key: &str, by: i64) -> Result<Option<i64>> {
        // Text serializers never store integers
        if !self.codec.integers_as_text() {
            return self.has(key).map(|_| None);
        }
        let key = self.prefixed(key);
        self.run(|conn| {
            soften(
                &key,
                self.increment.key(&key).arg(by).invoke::<Option<i64>>(conn),
            )
        })
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}{}*", escape_pattern(&self.prefix), escape_pattern(prefix));
        let keys = self.run(|conn| Self::scan(conn, &pattern))?;
        Ok(keys
            .into_iter()
            .filter_map(|raw| match String::from_utf8(raw) {
                Ok(key) => Some(key),
                Err(_) => {
                    debug!("skipping non UTF-8 key");
                    None
                }
            })
            .filter_map(|key| key.strip_prefix(self.prefix.as_str()).map(str::to_string))
            .collect())
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }
}

// == Helpers ==
/// True when the error means the connection itself is unusable.
fn is_transport_failure(err: &RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout()
}

/// Turns server-side data errors (wrong type, non-integer) into a default
/// result, keeping transport failures as errors.
fn soften<T: Default>(key: &str, result: RedisResult<T>) -> RedisResult<T> {
    match result {
        Err(err) if !is_transport_failure(&err) => {
            debug!(key, error = %err, "Redis rejected command, treating as miss");
            Ok(T::default())
        }
        other => other,
    }
}

/// Splits an optional scheme off the host. Returns whether it asks for TLS.
fn split_scheme(host: &str) -> Result<(bool, &str)> {
    match host.split_once("://") {
        None => Ok((false, host)),
        Some(("tls" | "ssl" | "rediss", rest)) => Ok((true, rest)),
        Some(("tcp" | "redis", rest)) => Ok((false, rest)),
        Some((scheme, _)) => Err(StorageError::Configuration(format!(
            "unsupported Redis host scheme '{}'",
            scheme
        ))),
    }
}

fn connection_url(host: &str, port: u16, tls: bool, verify_peer: bool) -> String {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    match (tls, verify_peer) {
        (false, _) => format!("redis://{}:{}/", host, port),
        (true, true) => format!("rediss://{}:{}/", host, port),
        (true, false) => format!("rediss://{}:{}/#insecure", host, port),
    }
}

/// Escapes glob metacharacters for `SCAN MATCH`.
fn escape_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
