use crate::base62;
use crate::error::ShortenerError;
use std::fmt::Display;
use std::num::NonZeroU64;

/// A short code assigned to a long value.
///
/// Codes are opaque keys: they are minted from allocator ids by
/// [`ShortCode::generated`] and are never decoded back into integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShortCode(String);

impl ShortCode {
    /// Mints the short code for a freshly allocated id.
    pub fn generated(id: NonZeroU64) -> Self {
        Self(base62::encode(id))
    }

    /// Creates a `ShortCode` from caller input.
    ///
    /// The only requirement is that the code is non-empty. A code containing
    /// characters outside the alphabet is accepted and simply never resolves.
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, ShortenerError> {
        let code = code.into();
        if code.is_empty() {
            return Err(ShortenerError::InvalidInput("empty short code".to_string()));
        }
        Ok(Self(code))
    }

    /// Creates a `ShortCode` without validation.
    ///
    /// Use this only for codes read back from the store.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Joins the code onto a host or base URL, e.g. `"host.com/b"`.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the short code as raw bytes, the form stored in the indexes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
