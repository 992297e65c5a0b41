use thiserror::Error;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Failures reported by a [`KeyValueBackend`](crate::backend::KeyValueBackend).
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
    #[error("storage backend is closed")]
    Closed,
}

/// Errors surfaced to callers of a [`Shortener`](crate::shortener::Shortener).
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The caller passed an empty long value or code. Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The short code has never been assigned.
    #[error("short code not found: {0}")]
    NotFound(String),
    /// Any transport or storage failure, including a stopped allocator.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl From<StorageError> for ShortenerError {
    fn from(value: StorageError) -> Self {
        Self::BackendUnavailable(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_storage_error_is_backend_unavailable() {
        let errors = [
            StorageError::Unavailable("connection refused".into()),
            StorageError::Timeout("read".into()),
            StorageError::InvalidData("lastID".into()),
            StorageError::Operation("WRONGTYPE".into()),
            StorageError::Closed,
        ];

        for err in errors {
            let mapped = ShortenerError::from(err);
            assert!(matches!(mapped, ShortenerError::BackendUnavailable(_)));
        }
    }
}
