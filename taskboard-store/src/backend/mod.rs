//! Key-value backends
//!
//! The store talks to its persistence layer through [`KvBackend`], a
//! minimal single-key interface plus sorted sets and batched writes:
//!
//! - [`RedisBackend`]: production backend on a pooled Redis connection
//! - [`MemoryBackend`]: in-process backend with per-key expiry, used by
//!   tests and embedders without Redis
//!
//! # Batches are not transactions
//!
//! A [`Batch`] sends several operations in one round trip. Operations are
//! applied in order but with no isolation from concurrent readers and no
//! rollback: if one operation fails the others may still have applied.

pub mod memory;
pub mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Backend errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Transport-level failure (IO, dropped connection, refused, timeout)
    ///
    /// Retryable at the caller's discretion.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend rejected the command
    #[error("Command error: {0}")]
    Command(String),
}

impl From<::redis::RedisError> for BackendError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            BackendError::Connection(err.to_string())
        } else {
            BackendError::Command(err.to_string())
        }
    }
}

/// One operation inside a [`Batch`]
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Write `value` at `key`, expiring after `ttl` if given
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Option<Duration>,
    },

    /// Delete `key` (absent keys are fine)
    Del { key: String },

    /// Insert or rescore `member` in the sorted set at `key`
    ZAdd {
        key: String,
        member: String,
        score: f64,
    },

    /// Remove `member` from the sorted set at `key`
    ZRem { key: String, member: String },
}

/// Ordered operations sent in a single round trip, without atomicity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Creates an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.ops.push(BatchOp::Set {
            key: key.into(),
            value,
            ttl: None,
        });
        self
    }

    pub fn del(mut self, key: impl Into<String>) -> Self {
        self.ops.push(BatchOp::Del { key: key.into() });
        self
    }

    pub fn zadd(mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> Self {
        self.ops.push(BatchOp::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    pub fn zrem(mut self, key: impl Into<String>, member: impl Into<String>) -> Self {
        self.ops.push(BatchOp::ZRem {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Keys touched by the batch, in order (for logging)
    pub fn keys(&self) -> Vec<&str> {
        self.ops
            .iter()
            .map(|op| match op {
                BatchOp::Set { key, .. }
                | BatchOp::Del { key }
                | BatchOp::ZAdd { key, .. }
                | BatchOp::ZRem { key, .. } => key.as_str(),
            })
            .collect()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Key-value persistence used by the record store
///
/// Implementations must be safe for concurrent use; the store shares one
/// instance across all requests without locking.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Reads the value at `key`; `None` if absent or expired
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Writes `value` at `key`, replacing any existing value and expiry
    ///
    /// With `ttl = Some(d)` the key expires after `d`. A zero `d` leaves the
    /// key absent (the write succeeds but is immediately unreadable).
    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError>;

    /// Deletes `key`; returns whether it existed
    async fn del(&self, key: &str) -> Result<bool, BackendError>;

    /// Reads many keys in one round trip, preserving order
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError>;

    /// All members of the sorted set at `key`, ascending by score then
    /// member; empty if the key is absent
    async fn zrange_all(&self, key: &str) -> Result<Vec<String>, BackendError>;

    /// Sends a batch in one round trip (see module docs on atomicity)
    async fn exec_batch(&self, batch: Batch) -> Result<(), BackendError>;

    /// Health check
    async fn ping(&self) -> Result<bool, BackendError>;
}

/// Whole milliseconds for an expiry, rounding sub-millisecond values up
///
/// Returns `None` for a zero duration.
pub(crate) fn ttl_millis(ttl: Duration) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    Some(millis.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder_keeps_order() {
        let batch = Batch::new()
            .set("task:t1", b"{}".to_vec())
            .zadd("user:u1:tasks", "t1", 1.0)
            .zrem("user:u1:tasks", "t0")
            .del("task:t0");

        assert_eq!(batch.len(), 4);
        assert_eq!(
            batch.keys(),
            vec!["task:t1", "user:u1:tasks", "user:u1:tasks", "task:t0"]
        );
    }

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::ZERO), None);
        assert_eq!(ttl_millis(Duration::from_micros(10)), Some(1));
        assert_eq!(ttl_millis(Duration::from_secs(2)), Some(2000));
    }
}
