use shorty_core::{ShortenerError, StorageError};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by id allocators.
#[derive(Debug, Clone, Error)]
pub enum AllocatorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("durable counter holds an invalid value: {0}")]
    InvalidCounter(String),
    #[error("id allocator is closed")]
    Closed,
    #[error("no id became available within {0:?}")]
    Timeout(Duration),
}

impl From<AllocatorError> for ShortenerError {
    fn from(value: AllocatorError) -> Self {
        Self::BackendUnavailable(value.to_string())
    }
}
