use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shorty_core::backend::KeyValueBackend;
use shorty_core::error::{Result, StorageError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// In-memory implementation of [`KeyValueBackend`] using DashMap.
///
/// Hash fields are flattened into a single map keyed by `(hash, field)`.
/// Counters are stored as decimal strings, the same representation Redis
/// uses, so `get` on a counter key returns e.g. `b"42"`.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    keys: DashMap<String, Vec<u8>>,
    fields: DashMap<(String, Vec<u8>), Vec<u8>>,
    closed: AtomicBool,
}

impl InMemoryBackend {
    /// Creates a new, empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of fields stored in the hash `map`.
    pub fn hash_len(&self, map: &str) -> usize {
        self.fields.iter().filter(|entry| entry.key().0 == map).count()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

fn parse_counter(key: &str, raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| StorageError::InvalidData(format!("value at '{key}' is not an integer")))
}

#[async_trait]
impl KeyValueBackend for InMemoryBackend {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.keys.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        Ok(self.keys.get(key).map(|value| value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.keys.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn hget(&self, map: &str, field: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        let key = (map.to_owned(), field.to_vec());
        Ok(self.fields.get(&key).map(|value| value.clone()))
    }

    async fn hset(&self, map: &str, field: &[u8], value: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.fields
            .insert((map.to_owned(), field.to_vec()), value.to_vec());
        Ok(())
    }

    async fn hset_nx(&self, map: &str, field: &[u8], value: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        match self.fields.entry((map.to_owned(), field.to_vec())) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value.to_vec());
                Ok(true)
            }
        }
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.ensure_open()?;
        let mut value = self
            .keys
            .entry(key.to_owned())
            .or_insert_with(|| b"0".to_vec());

        let next = parse_counter(key, value.as_slice())?
            .checked_add(1)
            .ok_or_else(|| StorageError::InvalidData(format!("increment of '{key}' overflows")))?;
        *value = next.to_string().into_bytes();

        Ok(next)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        debug!("closed in-memory backend");
    }
}
