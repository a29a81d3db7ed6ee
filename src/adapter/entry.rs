//! Cache Entry Module
//!
//! A stored payload plus its absolute expiration time.

use std::time::Duration;

// == Cache Entry ==
/// Represents a single stored entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The key as seen by the adapter (prefix included)
    pub key: String,
    /// Serialized value
    pub value: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<i64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry with an absolute expiration.
    pub fn new(key: impl Into<String>, value: Vec<u8>, expires_at: Option<i64>) -> Self {
        Self {
            key: key.into(),
            value,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time is greater than or equal
    /// to its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Same as [`CacheEntry::is_expired`] against a given clock reading.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Expiry ==
/// When a write should expire, resolved from an explicit or default TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Keep until deleted
    Never,
    /// Expire at this Unix timestamp in milliseconds
    At(i64),
    /// A zero TTL: the write is equivalent to a delete
    Elapsed,
}

impl Expiry {
    /// Resolves the effective expiry. An explicit `ttl` wins over `default_ttl`;
    /// with neither, the entry never expires.
    pub fn resolve(ttl: Option<Duration>, default_ttl: Option<Duration>) -> Self {
        match ttl.or(default_ttl) {
            None => Expiry::Never,
            Some(ttl) if ttl.is_zero() => Expiry::Elapsed,
            Some(ttl) => {
                let millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                Expiry::At(current_timestamp_ms().saturating_add(millis.max(1)))
            }
        }
    }

    /// Absolute timestamp for storage, None when the entry never expires.
    pub fn timestamp(self) -> Option<i64> {
        match self {
            Expiry::At(at) => Some(at),
            Expiry::Never | Expiry::Elapsed => None,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_entry_without_expiry() {
        let entry = CacheEntry::new("key", b"value".to_vec(), None);

        assert_eq!(entry.key, "key");
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_expiration() {
        let expiry = Expiry::resolve(Some(Duration::from_secs(1)), None);
        let entry = CacheEntry::new("key", b"value".to_vec(), expiry.timestamp());

        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = CacheEntry::new("key", Vec::new(), Some(now));

        assert!(entry.is_expired_at(now), "Entry should be expired at boundary");
        assert!(!entry.is_expired_at(now - 1));
    }

    #[test]
    fn test_resolve_prefers_explicit_ttl() {
        let before = current_timestamp_ms();
        let expiry = Expiry::resolve(
            Some(Duration::from_secs(10)),
            Some(Duration::from_secs(3600)),
        );
        let at = expiry.timestamp().unwrap();
        assert!(at >= before + 10_000);
        assert!(at < before + 3_600_000);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let expiry = Expiry::resolve(None, Some(Duration::from_secs(60)));
        assert!(matches!(expiry, Expiry::At(_)));
    }

    #[test]
    fn test_resolve_forever() {
        assert_eq!(Expiry::resolve(None, None), Expiry::Never);
        assert_eq!(Expiry::Never.timestamp(), None);
    }

    #[test]
    fn test_resolve_zero_ttl() {
        assert_eq!(Expiry::resolve(Some(Duration::ZERO), None), Expiry::Elapsed);
    }

    #[test]
    fn test_resolve_huge_ttl_saturates() {
        let expiry = Expiry::resolve(Some(Duration::MAX), None);
        assert_eq!(expiry.timestamp(), Some(i64::MAX));
    }
}
