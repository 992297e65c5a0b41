//! Core types and traits for the shorty mapping engine.
//!
//! This crate provides the short code encoder, the error taxonomy and the
//! traits shared by the storage backends, the id allocator, the shortener
//! service and the HTTP gateway.

pub mod backend;
pub mod base62;
pub mod error;
pub mod observer;
pub mod shortcode;
pub mod shortener;

pub use backend::KeyValueBackend;
pub use error::{ShortenerError, StorageError};
pub use observer::{LatencyObserver, NoopObserver, Operation, Outcome};
pub use shortcode::ShortCode;
pub use shortener::Shortener;
