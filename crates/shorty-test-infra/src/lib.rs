//! Disposable containers for integration tests.

mod error;
pub mod redis;

pub use error::{Result, TestInfraError};
