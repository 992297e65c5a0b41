use crate::policy::WritePolicy;
use async_trait::async_trait;
use shorty_core::backend::{KeyValueBackend, LONG_TO_SHORT, SHORT_TO_LONG};
use shorty_core::{
    LatencyObserver, NoopObserver, Operation, Outcome, ShortCode, Shortener, ShortenerError,
    StorageError,
};
use shorty_generator::IdAllocator;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// A concrete implementation of the [`Shortener`] trait.
///
/// Long values are stored in the `longToShort` hash and codes in the
/// `shortToLong` hash of the backend. New codes are the base62 form of ids
/// drawn from the allocator.
///
/// The lookup before a create is not locked against other creators. Under
/// [`WritePolicy::LastWriterWins`] two concurrent creates for the same
/// unseen value allocate two codes, the later forward write wins, and both
/// codes keep resolving to the value.
pub struct ShortenerService<B, A> {
    backend: Arc<B>,
    allocator: Arc<A>,
    observer: Arc<dyn LatencyObserver>,
    policy: WritePolicy,
}

impl<B, A> Clone for ShortenerService<B, A> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            allocator: Arc::clone(&self.allocator),
            observer: Arc::clone(&self.observer),
            policy: self.policy,
        }
    }
}

impl<B: KeyValueBackend, A: IdAllocator> ShortenerService<B, A> {
    /// Creates a service with the default write policy and no latency observer.
    pub fn new(backend: Arc<B>, allocator: Arc<A>) -> Self {
        Self {
            backend,
            allocator,
            observer: Arc::new(NoopObserver),
            policy: WritePolicy::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn LatencyObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn lookup_long_value(&self, code: &str) -> Result<Vec<u8>> {
        let code = ShortCode::new(code)?;

        let long_value = self
            .backend
            .hget(SHORT_TO_LONG, code.as_bytes())
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to read reverse index");
                ShortenerError::from(e)
            })?;

        long_value.ok_or_else(|| {
            debug!(code = %code, "Short code not found");
            ShortenerError::NotFound(code.to_string())
        })
    }

    async fn lookup_code(&self, long_value: &[u8]) -> Result<Option<ShortCode>> {
        let stored = self
            .backend
            .hget(LONG_TO_SHORT, long_value)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read forward index");
                ShortenerError::from(e)
            })?;

        stored
            .map(|raw| {
                String::from_utf8(raw).map(ShortCode::new_unchecked).map_err(|_| {
                    ShortenerError::from(StorageError::InvalidData(
                        "forward index holds a non UTF-8 short code".to_string(),
                    ))
                })
            })
            .transpose()
    }

    async fn create(&self, long_value: &[u8]) -> Result<ShortCode> {
        if long_value.is_empty() {
            return Err(ShortenerError::InvalidInput("empty long value".to_string()));
        }

        if let Some(code) = self.lookup_code(long_value).await? {
            trace!(code = %code, "Long value already mapped");
            return Ok(code);
        }

        let id = self.allocator.next_id().await.map_err(|e| {
            warn!(error = %e, "Failed to allocate id");
            ShortenerError::from(e)
        })?;
        let code = ShortCode::generated(id);

        match self.policy {
            WritePolicy::LastWriterWins => {
                self.write_unconditionally(long_value, &code).await?;
                debug!(code = %code, id = id.get(), "Created short code");
                Ok(code)
            }
            WritePolicy::SetIfAbsent => self.write_if_absent(long_value, code).await,
        }
    }

    async fn write_unconditionally(&self, long_value: &[u8], code: &ShortCode) -> Result<()> {
        self.backend
            .hset(LONG_TO_SHORT, long_value, code.as_bytes())
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to write forward index");
                ShortenerError::from(e)
            })?;

        // A failure here leaves a forward entry whose code has no reverse
        // entry. Repeating the create returns that code.
        self.backend
            .hset(SHORT_TO_LONG, code.as_bytes(), long_value)
            .await
            .map_err(|e| {
                warn!(
                    code = %code,
                    error = %e,
                    "Failed to write reverse index after forward index was written"
                );
                ShortenerError::from(e)
            })
    }

    async fn write_if_absent(&self, long_value: &[u8], code: ShortCode) -> Result<ShortCode> {
        // Reverse first: the code is fresh, so this never collides, and the
        // forward claim below only ever points at a resolvable code.
        self.backend
            .hset(SHORT_TO_LONG, code.as_bytes(), long_value)
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to write reverse index");
                ShortenerError::from(e)
            })?;

        let claimed = self
            .backend
            .hset_nx(LONG_TO_SHORT, long_value, code.as_bytes())
            .await
            .map_err(|e| {
                warn!(code = %code, error = %e, "Failed to claim forward index");
                ShortenerError::from(e)
            })?;

        if claimed {
            debug!(code = %code, "Created short code");
            return Ok(code);
        }

        match self.lookup_code(long_value).await? {
            Some(winner) => {
                debug!(code = %code, winner = %winner, "Lost forward claim to a concurrent create");
                Ok(winner)
            }
            None => Err(ShortenerError::BackendUnavailable(
                "forward entry vanished after a failed claim".to_string(),
            )),
        }
    }
}

#[async_trait]
impl<B: KeyValueBackend, A: IdAllocator> Shortener for ShortenerService<B, A> {
    async fn resolve_by_code(&self, code: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let result = self.lookup_long_value(code).await;
        self.observer.observe(
            Operation::ResolveByCode,
            Outcome::of(&result),
            started.elapsed(),
        );
        result
    }

    async fn resolve_or_create(&self, long_value: &[u8]) -> Result<ShortCode> {
        let started = Instant::now();
        let result = self.create(long_value).await;
        self.observer.observe(
            Operation::ResolveOrCreate,
            Outcome::of(&result),
            started.elapsed(),
        );
        result
    }

    async fn close(&self) {
        self.allocator.close().await;
        self.backend.close().await;
        info!("Shortener service closed");
    }
}
