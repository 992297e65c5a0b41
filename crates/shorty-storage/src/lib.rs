//! Key-value backends for the shorty mapping engine.
//!
//! [`RedisBackend`] talks to a Redis server through a connection pool.
//! [`InMemoryBackend`] keeps everything in process and is used for tests and
//! single-node runs without persistence.

pub mod memory;
pub mod redis;

pub use memory::InMemoryBackend;
pub use redis::RedisBackend;
