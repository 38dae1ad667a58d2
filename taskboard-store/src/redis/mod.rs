//! Redis connection management
//!
//! The store holds exactly one `RedisClient`. It is cheap to clone and
//! safe to share across tasks: the underlying `ConnectionManager`
//! multiplexes requests over one connection and reconnects on failure, so
//! no external locking is needed.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
