use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// The two-way mapping between long values and short codes.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the long value the code was assigned to.
    ///
    /// Fails with `NotFound` if the code was never assigned and with
    /// `InvalidInput` if it is empty.
    async fn resolve_by_code(&self, code: &str) -> Result<Vec<u8>>;

    /// Returns the code assigned to `long_value`, assigning a new one on
    /// first use. Repeated calls with the same value return the same code.
    async fn resolve_or_create(&self, long_value: &[u8]) -> Result<ShortCode>;

    /// Stops background work and releases backend connections.
    async fn close(&self);
}
