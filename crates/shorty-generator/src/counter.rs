use crate::{AllocatorError, IdAllocator};
use async_trait::async_trait;
use shorty_core::backend::{KeyValueBackend, LAST_ID_KEY};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Configures a [`CounterAllocator`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct AllocatorSettings {
    /// Number of ids the producer may prepare ahead of consumers.
    ///
    /// An id is handed to the channel before its counter write, so a crash
    /// can leave `lastID` behind the highest prepared id. Ids still buffered
    /// at shutdown are skipped on restart. Values below 1 are treated as 1.
    #[builder(default = 1)]
    pub buffer: usize,
    /// How long `next_id` waits for the producer before giving up.
    #[builder(default = Duration::from_secs(5))]
    pub allocation_timeout: Duration,
    /// First delay before retrying a failed counter write. Doubles on each
    /// consecutive failure, capped at five seconds.
    #[builder(default = Duration::from_millis(100))]
    pub retry_delay: Duration,
    /// How long `close` waits for an in-flight counter write before
    /// aborting the producer.
    #[builder(default = Duration::from_secs(5))]
    pub close_timeout: Duration,
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Id allocator backed by the durable `lastID` counter.
///
/// A single producer task owns the in-memory counter. For each id it
/// increments the counter, delivers the id through a bounded channel and
/// then increments `lastID` in the backend. The durable write happens after
/// delivery, so a crash between the two can make `lastID` lag behind the
/// highest id handed out. Until the write succeeds the producer retries and
/// prepares no further ids.
pub struct CounterAllocator {
    receiver: Mutex<mpsc::Receiver<NonZeroU64>>,
    shutdown: watch::Sender<bool>,
    producer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    allocation_timeout: Duration,
    close_timeout: Duration,
}

impl std::fmt::Debug for CounterAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterAllocator")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("allocation_timeout", &self.allocation_timeout)
            .field("close_timeout", &self.close_timeout)
            .finish_non_exhaustive()
    }
}

impl CounterAllocator {
    /// Loads the durable counter and starts the producer task.
    ///
    /// A missing counter is created with value `0`. Fails if the backend is
    /// unreachable or the stored value is not a non-negative integer.
    pub async fn start<B: KeyValueBackend>(
        backend: Arc<B>,
        settings: AllocatorSettings,
    ) -> Result<Self, AllocatorError> {
        let last_id = load_counter(backend.as_ref()).await?;

        let (tx, rx) = mpsc::channel(settings.buffer.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);
        let producer = tokio::spawn(produce(
            backend,
            last_id,
            tx,
            shutdown_rx,
            settings.retry_delay,
        ));

        Ok(Self {
            receiver: Mutex::new(rx),
            shutdown,
            producer: Mutex::new(Some(producer)),
            closed: AtomicBool::new(false),
            allocation_timeout: settings.allocation_timeout,
            close_timeout: settings.close_timeout,
        })
    }
}

#[async_trait]
impl IdAllocator for CounterAllocator {
    async fn next_id(&self) -> Result<NonZeroU64, AllocatorError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AllocatorError::Closed);
        }

        let received = tokio::time::timeout(self.allocation_timeout, async {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await
        })
        .await;

        match received {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(AllocatorError::Closed),
            Err(_) => {
                warn!(timeout = ?self.allocation_timeout, "Timed out waiting for next id");
                Err(AllocatorError::Timeout(self.allocation_timeout))
            }
        }
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.send_replace(true);

        let producer = self.producer.lock().await.take();
        if let Some(mut producer) = producer {
            match tokio::time::timeout(self.close_timeout, &mut producer).await {
                Ok(Ok(())) => info!("Id allocator stopped"),
                Ok(Err(e)) => error!(error = %e, "Id producer task failed"),
                Err(_) => {
                    warn!(
                        timeout = ?self.close_timeout,
                        "Counter write still pending at close, aborting id producer"
                    );
                    producer.abort();
                }
            }
        }
    }
}

async fn load_counter<B: KeyValueBackend>(backend: &B) -> Result<u64, AllocatorError> {
    if !backend.exists(LAST_ID_KEY).await? {
        backend.set(LAST_ID_KEY, b"0").await?;
        info!(key = LAST_ID_KEY, "Durable counter not found, initialized to 0");
        return Ok(0);
    }

    let raw = backend.get(LAST_ID_KEY).await?.ok_or_else(|| {
        AllocatorError::InvalidCounter(format!("'{LAST_ID_KEY}' vanished while loading"))
    })?;
    let last_id = std::str::from_utf8(&raw)
        .ok()
        .and_then(|text| text.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            AllocatorError::InvalidCounter(format!(
                "'{}' is not a non-negative integer",
                String::from_utf8_lossy(&raw)
            ))
        })?;

    info!(key = LAST_ID_KEY, last_id, "Resuming from durable counter");
    Ok(last_id)
}

async fn produce<B: KeyValueBackend>(
    backend: Arc<B>,
    mut last_id: u64,
    tx: mpsc::Sender<NonZeroU64>,
    mut shutdown: watch::Receiver<bool>,
    retry_delay: Duration,
) {
    loop {
        let permit = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let Some(id) = last_id.checked_add(1).and_then(NonZeroU64::new) else {
            error!(last_id, "Id space exhausted");
            break;
        };
        last_id = id.get();
        permit.send(id);

        if !persist(backend.as_ref(), id, &mut shutdown, retry_delay).await {
            break;
        }
    }

    debug!(last_id, "Id producer exiting");
}

/// Increments the durable counter once for `id`, retrying until it succeeds.
///
/// Returns `false` if the producer should stop.
async fn persist<B: KeyValueBackend>(
    backend: &B,
    id: NonZeroU64,
    shutdown: &mut watch::Receiver<bool>,
    retry_delay: Duration,
) -> bool {
    let mut delay = retry_delay;
    loop {
        match backend.incr(LAST_ID_KEY).await {
            Ok(stored) => {
                if u64::try_from(stored).ok() != Some(id.get()) {
                    warn!(
                        id = id.get(),
                        stored, "Durable counter diverged from the delivered id"
                    );
                }
                return true;
            }
            Err(shorty_core::StorageError::Closed) => {
                warn!(id = id.get(), "Backend closed before counter was persisted");
                return false;
            }
            Err(e) => {
                warn!(id = id.get(), error = %e, retry_in = ?delay, "Failed to persist counter");
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return false,
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorty_core::error::Result as StorageResult;
    use shorty_core::StorageError;
    use shorty_storage::InMemoryBackend;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    fn fast_settings() -> AllocatorSettings {
        AllocatorSettings::builder()
            .allocation_timeout(Duration::from_secs(2))
            .retry_delay(Duration::from_millis(5))
            .build()
    }

    async fn stored_counter(backend: &InMemoryBackend) -> u64 {
        let raw = backend.get(LAST_ID_KEY).await.unwrap().unwrap();
        String::from_utf8(raw).unwrap().parse().unwrap()
    }

    /// Fails the first `failures` increments, then delegates. With `stall`
    /// set, increments never complete.
    struct FlakyIncr {
        inner: InMemoryBackend,
        failures: AtomicUsize,
        stall: bool,
    }

    #[async_trait]
    impl KeyValueBackend for FlakyIncr {
        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.inner.exists(key).await
        }
        async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
            self.inner.set(key, value).await
        }
        async fn hget(&self, map: &str, field: &[u8]) -> StorageResult<Option<Vec<u8>>> {
            self.inner.hget(map, field).await
        }
        async fn hset(&self, map: &str, field: &[u8], value: &[u8]) -> StorageResult<()> {
            self.inner.hset(map, field, value).await
        }
        async fn hset_nx(&self, map: &str, field: &[u8], value: &[u8]) -> StorageResult<bool> {
            self.inner.hset_nx(map, field, value).await
        }
        async fn incr(&self, key: &str) -> StorageResult<i64> {
            if self.stall {
                return std::future::pending().await;
            }
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StorageError::Unavailable("connection refused".into()));
            }
            self.inner.incr(key).await
        }
        async fn close(&self) {
            self.inner.close().await
        }
    }

    #[tokio::test]
    async fn fresh_store_starts_at_one() {
        let backend = Arc::new(InMemoryBackend::new());
        let allocator = CounterAllocator::start(Arc::clone(&backend), fast_settings())
            .await
            .unwrap();

        assert!(backend.exists(LAST_ID_KEY).await.unwrap());

        let ids = [
            allocator.next_id().await.unwrap().get(),
            allocator.next_id().await.unwrap().get(),
            allocator.next_id().await.unwrap().get(),
        ];
        assert_eq!(ids, [1, 2, 3]);

        allocator.close().await;
        assert!(stored_counter(&backend).await >= 3);
    }

    #[tokio::test]
    async fn resumes_after_persisted_counter() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set(LAST_ID_KEY, b"41").await.unwrap();

        let allocator = CounterAllocator::start(Arc::clone(&backend), fast_settings())
            .await
            .unwrap();

        assert_eq!(allocator.next_id().await.unwrap().get(), 42);
        assert_eq!(allocator.next_id().await.unwrap().get(), 43);
    }

    #[tokio::test]
    async fn restart_never_repeats_an_id() {
        let backend = Arc::new(InMemoryBackend::new());

        let first = CounterAllocator::start(Arc::clone(&backend), fast_settings())
            .await
            .unwrap();
        let mut last = 0;
        for _ in 0..5 {
            last = first.next_id().await.unwrap().get();
        }
        first.close().await;

        let second = CounterAllocator::start(Arc::clone(&backend), fast_settings())
            .await
            .unwrap();
        assert!(second.next_id().await.unwrap().get() > last);
    }

    #[tokio::test]
    async fn rejects_invalid_counter() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set(LAST_ID_KEY, b"-3").await.unwrap();

        let err = CounterAllocator::start(backend, fast_settings())
            .await
            .unwrap_err();
        assert!(matches!(err, AllocatorError::InvalidCounter(_)));
    }

    #[tokio::test]
    async fn start_fails_when_backend_is_down() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.close().await;

        let err = CounterAllocator::start(backend, fast_settings())
            .await
            .unwrap_err();
        assert!(matches!(err, AllocatorError::Storage(StorageError::Closed)));
    }

    #[tokio::test]
    async fn concurrent_callers_get_unique_ids() {
        let backend = Arc::new(InMemoryBackend::new());
        let allocator = Arc::new(
            CounterAllocator::start(backend, fast_settings())
                .await
                .unwrap(),
        );

        let mut handles = vec![];
        for _ in 0..50 {
            let allocator = Arc::clone(&allocator);
            handles.push(tokio::spawn(async move {
                let mut ids = vec![];
                for _ in 0..20 {
                    ids.push(allocator.next_id().await.unwrap().get());
                }
                ids
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.await.unwrap();
            assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
            seen.extend(ids);
        }

        assert_eq!(seen, (1..=1000).collect::<HashSet<u64>>());
    }

    #[tokio::test]
    async fn retries_failed_counter_writes() {
        let backend = Arc::new(FlakyIncr {
            inner: InMemoryBackend::new(),
            failures: AtomicUsize::new(3),
            stall: false,
        });
        let allocator = CounterAllocator::start(Arc::clone(&backend), fast_settings())
            .await
            .unwrap();

        assert_eq!(allocator.next_id().await.unwrap().get(), 1);
        assert_eq!(allocator.next_id().await.unwrap().get(), 2);

        allocator.close().await;
        assert_eq!(backend.failures.load(Ordering::SeqCst), 0);
        assert!(stored_counter(&backend.inner).await >= 2);
    }

    #[tokio::test]
    async fn closed_allocator_rejects_requests() {
        let backend = Arc::new(InMemoryBackend::new());
        let allocator = CounterAllocator::start(backend, fast_settings())
            .await
            .unwrap();

        allocator.close().await;
        allocator.close().await;

        assert!(matches!(
            allocator.next_id().await.unwrap_err(),
            AllocatorError::Closed
        ));
    }

    #[tokio::test]
    async fn times_out_when_producer_is_stuck() {
        let backend = Arc::new(FlakyIncr {
            inner: InMemoryBackend::new(),
            failures: AtomicUsize::new(usize::MAX),
            stall: false,
        });
        let settings = AllocatorSettings::builder()
            .allocation_timeout(Duration::from_millis(50))
            .retry_delay(Duration::from_millis(5))
            .build();
        let allocator = CounterAllocator::start(backend, settings).await.unwrap();

        // The first id is delivered before its write fails.
        assert_eq!(allocator.next_id().await.unwrap().get(), 1);
        assert!(matches!(
            allocator.next_id().await.unwrap_err(),
            AllocatorError::Timeout(_)
        ));

        allocator.close().await;
    }

    #[tokio::test]
    async fn close_gives_up_on_a_stalled_counter_write() {
        let backend = Arc::new(FlakyIncr {
            inner: InMemoryBackend::new(),
            failures: AtomicUsize::new(0),
            stall: true,
        });
        let settings = AllocatorSettings::builder()
            .close_timeout(Duration::from_millis(50))
            .build();
        let allocator = CounterAllocator::start(backend, settings).await.unwrap();

        assert_eq!(allocator.next_id().await.unwrap().get(), 1);
        tokio::time::timeout(Duration::from_secs(2), allocator.close())
            .await
            .expect("close should not wait on the stalled write");
        assert!(matches!(
            allocator.next_id().await.unwrap_err(),
            AllocatorError::Closed
        ));
    }
}
