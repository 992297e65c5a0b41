use crate::error::Result;
use async_trait::async_trait;

/// Key holding the durable allocation counter.
pub const LAST_ID_KEY: &str = "lastID";

/// Hash mapping long values to their short codes.
pub const LONG_TO_SHORT: &str = "longToShort";

/// Hash mapping short codes back to their long values.
pub const SHORT_TO_LONG: &str = "shortToLong";

/// A remote key-value store with plain keys and hashes.
///
/// Every call is independent; implementations are not expected to offer
/// multi-key transactions. Implementations must be safe to share across
/// tasks, typically by pooling connections internally.
#[async_trait]
pub trait KeyValueBackend: Send + Sync + 'static {
    /// Checks whether a plain key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Reads a plain key. Returns `None` if it is absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes a plain key, replacing any previous value.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Reads a field of the hash `map`. Returns `None` if the field is absent.
    async fn hget(&self, map: &str, field: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Writes a field of the hash `map`, replacing any previous value.
    async fn hset(&self, map: &str, field: &[u8], value: &[u8]) -> Result<()>;

    /// Writes a field of the hash `map` only if it is absent.
    ///
    /// Returns `true` if this call created the field.
    async fn hset_nx(&self, map: &str, field: &[u8], value: &[u8]) -> Result<bool>;

    /// Atomically increments the integer stored at `key` by one and returns
    /// the new value. A missing key counts as zero.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Releases pooled connections. Calls made afterwards fail.
    async fn close(&self);
}
