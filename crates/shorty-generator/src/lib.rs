mod counter;
mod error;

pub use counter::{AllocatorSettings, CounterAllocator};
pub use error::AllocatorError;

use async_trait::async_trait;
use std::num::NonZeroU64;

/// Hands out unique, strictly increasing ids.
///
/// Every id is delivered to exactly one caller, including across process
/// restarts. Ids may be skipped but are never repeated.
#[async_trait]
pub trait IdAllocator: Send + Sync + 'static {
    /// Returns the next id, waiting for the producer if none is buffered.
    async fn next_id(&self) -> Result<NonZeroU64, AllocatorError>;

    /// Stops producing ids. Later calls to `next_id` fail with
    /// [`AllocatorError::Closed`].
    async fn close(&self);
}
