//! Redis backend
//!
//! Maps [`KvBackend`] onto Redis commands:
//!
//! ```text
//! get          GET key
//! set          SET key value [PX ms]
//! del          DEL key
//! mget         MGET key [key ...]
//! zrange_all   ZRANGE key 0 -1
//! exec_batch   pipelined SET/DEL/ZADD/ZREM (no MULTI/EXEC)
//! ```
//!
//! Expiry is delegated entirely to Redis' native per-key TTL.

use super::{ttl_millis, BackendError, Batch, BatchOp, KvBackend};
use crate::redis::RedisClient;
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

/// [`KvBackend`] on a shared [`RedisClient`]
#[derive(Clone)]
pub struct RedisBackend {
    client: RedisClient,
}

impl RedisBackend {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

/// Appends a SET (or DEL, for an already-elapsed TTL) to the pipeline
fn pipe_set(pipe: &mut redis::Pipeline, key: &str, value: &[u8], ttl: Option<Duration>) {
    match ttl {
        None => {
            pipe.cmd("SET").arg(key).arg(value).ignore();
        }
        Some(ttl) => match ttl_millis(ttl) {
            Some(ms) => {
                pipe.cmd("SET").arg(key).arg(value).arg("PX").arg(ms).ignore();
            }
            None => {
                pipe.cmd("DEL").arg(key).ignore();
            }
        },
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.client.get_connection();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        let mut conn = self.client.get_connection();
        let mut pipe = redis::pipe();
        pipe_set(&mut pipe, key, &value, ttl);
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, BackendError> {
        let mut conn = self.client.get_connection();
        let deleted: u64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.client.get_connection();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn zrange_all(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.client.get_connection();
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn exec_batch(&self, batch: Batch) -> Result<(), BackendError> {
        if batch.is_empty() {
            return Ok(());
        }

        tracing::trace!(ops = batch.len(), keys = ?batch.keys(), "Sending batch");

        let mut pipe = redis::pipe();
        for op in batch.into_ops() {
            match op {
                BatchOp::Set { key, value, ttl } => pipe_set(&mut pipe, &key, &value, ttl),
                BatchOp::Del { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                BatchOp::ZAdd { key, member, score } => {
                    pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
                }
                BatchOp::ZRem { key, member } => {
                    pipe.cmd("ZREM").arg(key).arg(member).ignore();
                }
            }
        }

        let mut conn = self.client.get_connection();
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<bool, BackendError> {
        self.client.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::RedisConfig;
    use uuid::Uuid;

    async fn backend() -> RedisBackend {
        let client = RedisClient::new(RedisConfig::new("redis://localhost:6379"))
            .await
            .unwrap();
        RedisBackend::new(client)
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_set_get_del() {
        let backend = backend().await;
        let key = format!("test:{}", Uuid::new_v4());

        backend.set(&key, b"value".to_vec(), None).await.unwrap();
        assert_eq!(backend.get(&key).await.unwrap(), Some(b"value".to_vec()));

        assert!(backend.del(&key).await.unwrap());
        assert!(!backend.del(&key).await.unwrap());
        assert_eq!(backend.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_set_with_ttl_expires() {
        let backend = backend().await;
        let key = format!("test:{}", Uuid::new_v4());

        backend
            .set(&key, b"v".to_vec(), Some(Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(backend.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(backend.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_zero_ttl_leaves_key_absent() {
        let backend = backend().await;
        let key = format!("test:{}", Uuid::new_v4());

        backend.set(&key, b"v".to_vec(), None).await.unwrap();
        backend
            .set(&key, b"v2".to_vec(), Some(Duration::ZERO))
            .await
            .unwrap();
        assert!(backend.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_batch_and_zrange() {
        let backend = backend().await;
        let index = format!("test:{}:idx", Uuid::new_v4());

        backend
            .exec_batch(
                Batch::new()
                    .zadd(&index, "b", 2.0)
                    .zadd(&index, "a", 1.0)
                    .zadd(&index, "c", 3.0),
            )
            .await
            .unwrap();
        assert_eq!(backend.zrange_all(&index).await.unwrap(), vec!["a", "b", "c"]);

        backend
            .exec_batch(Batch::new().zrem(&index, "b"))
            .await
            .unwrap();
        assert_eq!(backend.zrange_all(&index).await.unwrap(), vec!["a", "c"]);

        backend.del(&index).await.unwrap();
    }
}
