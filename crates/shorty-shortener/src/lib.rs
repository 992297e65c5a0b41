//! The shorty mapping service.
//!
//! [`ShortenerService`] maps long values to short codes and back, storing
//! both directions in a [`KeyValueBackend`](shorty_core::KeyValueBackend)
//! and minting new codes from an [`IdAllocator`](shorty_generator::IdAllocator).

pub mod policy;
pub mod service;

pub use policy::WritePolicy;
pub use service::ShortenerService;
pub use shorty_core::{Shortener, ShortenerError};
