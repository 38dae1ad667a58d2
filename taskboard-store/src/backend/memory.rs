//! In-process backend with per-key expiry
//!
//! Reproduces the subset of Redis semantics the store relies on: plain
//! values, sorted sets ordered by (score, member) and per-key TTL. Expired
//! keys are invisible to reads immediately and are physically removed
//! either lazily on access or by the optional background sweeper.
//!
//! All state sits behind one async mutex, so a [`Batch`] is applied as a
//! unit here. Callers must not rely on that: the Redis backend gives no
//! such guarantee.

use super::{BackendError, Batch, BatchOp, KvBackend};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
}

impl State {
    /// Live entry at `key`, dropping it first if it has expired
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn get(&mut self, key: &str, now: Instant) -> Result<Option<Vec<u8>>, BackendError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Bytes(bytes),
                ..
            }) => Ok(Some(bytes.clone())),
            Some(_) => Err(BackendError::Command(WRONGTYPE.to_string())),
        }
    }

    fn set(&mut self, key: &str, value: Vec<u8>, ttl: Option<Duration>, now: Instant) {
        match ttl {
            Some(ttl) if ttl.is_zero() => {
                self.entries.remove(key);
            }
            _ => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Bytes(value),
                        expires_at: ttl.map(|ttl| now + ttl),
                    },
                );
            }
        }
    }

    fn del(&mut self, key: &str, now: Instant) -> bool {
        let existed = self.live(key, now).is_some();
        self.entries.remove(key);
        existed
    }

    fn zadd(&mut self, key: &str, member: String, score: f64, now: Instant) -> Result<(), BackendError> {
        match self.live(key, now) {
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => {
                set.insert(member, score);
                Ok(())
            }
            Some(_) => Err(BackendError::Command(WRONGTYPE.to_string())),
            None => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::SortedSet(HashMap::from([(member, score)])),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    fn zrem(&mut self, key: &str, member: &str, now: Instant) -> Result<(), BackendError> {
        let emptied = match self.live(key, now) {
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => {
                set.remove(member);
                set.is_empty()
            }
            Some(_) => return Err(BackendError::Command(WRONGTYPE.to_string())),
            None => false,
        };
        // Redis drops a sorted set once its last member is removed
        if emptied {
            self.entries.remove(key);
        }
        Ok(())
    }

    fn zrange_all(&mut self, key: &str, now: Instant) -> Result<Vec<String>, BackendError> {
        match self.live(key, now) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => {
                let mut members: Vec<(&String, &f64)> = set.iter().collect();
                members.sort_by(|(ma, sa), (mb, sb)| {
                    sa.partial_cmp(sb)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| ma.cmp(mb))
                });
                Ok(members.into_iter().map(|(m, _)| m.clone()).collect())
            }
            Some(_) => Err(BackendError::Command(WRONGTYPE.to_string())),
        }
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

/// [`KvBackend`] held entirely in memory
///
/// Cloning shares the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every expired key, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        self.state.lock().await.purge_expired(Instant::now())
    }

    /// Number of keys physically held, including expired ones not yet reaped
    pub async fn stored_keys(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    /// Spawns a task reaping expired keys every `interval` until `shutdown`
    /// is cancelled
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let backend = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Memory backend sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let reaped = backend.purge_expired().await;
                        if reaped > 0 {
                            tracing::trace!(reaped, "Reaped expired keys");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.state.lock().await.get(key, Instant::now())
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.state.lock().await.set(key, value, ttl, Instant::now());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, BackendError> {
        Ok(self.state.lock().await.del(key, Instant::now()))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        // MGET reports wrong-typed keys as nil rather than failing
        Ok(keys
            .iter()
            .map(|key| state.get(key, now).ok().flatten())
            .collect())
    }

    async fn zrange_all(&self, key: &str) -> Result<Vec<String>, BackendError> {
        self.state.lock().await.zrange_all(key, Instant::now())
    }

    async fn exec_batch(&self, batch: Batch) -> Result<(), BackendError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut first_error = None;

        // Like a pipeline: every op runs, the first failure is reported
        for op in batch.into_ops() {
            let result = match op {
                BatchOp::Set { key, value, ttl } => {
                    state.set(&key, value, ttl, now);
                    Ok(())
                }
                BatchOp::Del { key } => {
                    state.del(&key, now);
                    Ok(())
                }
                BatchOp::ZAdd { key, member, score } => state.zadd(&key, member, score, now),
                BatchOp::ZRem { key, member } => state.zrem(&key, &member, now),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn ping(&self) -> Result<bool, BackendError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let backend = MemoryBackend::new();

        backend.set("k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some(b"v".to_vec()));

        assert!(backend.del("k").await.unwrap());
        assert!(!backend.del("k").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let backend = MemoryBackend::new();

        backend
            .set("session:s1", b"v".to_vec(), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(backend.get("session:s1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(backend.get("session:s1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(backend.get("session:s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_removes_key() {
        let backend = MemoryBackend::new();

        backend.set("k", b"old".to_vec(), None).await.unwrap();
        backend
            .set("k", b"new".to_vec(), Some(Duration::ZERO))
            .await
            .unwrap();

        assert!(backend.get("k").await.unwrap().is_none());
        assert_eq!(backend.stored_keys().await, 0);
    }

    #[tokio::test]
    async fn test_set_clears_previous_ttl() {
        let backend = MemoryBackend::new();

        backend
            .set("k", b"v".to_vec(), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        backend.set("k", b"v".to_vec(), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(backend.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sorted_set_ordering() {
        let backend = MemoryBackend::new();

        backend
            .exec_batch(
                Batch::new()
                    .zadd("idx", "c", 3.0)
                    .zadd("idx", "a", 1.0)
                    .zadd("idx", "b2", 2.0)
                    .zadd("idx", "b1", 2.0),
            )
            .await
            .unwrap();

        assert_eq!(
            backend.zrange_all("idx").await.unwrap(),
            vec!["a", "b1", "b2", "c"]
        );
    }

    #[tokio::test]
    async fn test_zrem_last_member_drops_key() {
        let backend = MemoryBackend::new();

        backend
            .exec_batch(Batch::new().zadd("idx", "a", 1.0))
            .await
            .unwrap();
        backend
            .exec_batch(Batch::new().zrem("idx", "a").zrem("idx", "missing"))
            .await
            .unwrap();

        assert!(backend.zrange_all("idx").await.unwrap().is_empty());
        assert_eq!(backend.stored_keys().await, 0);
    }

    #[tokio::test]
    async fn test_wrong_type_errors() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v".to_vec(), None).await.unwrap();

        assert!(matches!(
            backend.zrange_all("k").await,
            Err(BackendError::Command(_))
        ));

        // Remaining ops in the batch still apply
        let result = backend
            .exec_batch(Batch::new().zadd("k", "m", 1.0).set("other", b"x".to_vec()))
            .await;
        assert!(matches!(result, Err(BackendError::Command(_))));
        assert_eq!(backend.get("other").await.unwrap(), Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_mget_preserves_order() {
        let backend = MemoryBackend::new();
        backend.set("a", b"1".to_vec(), None).await.unwrap();
        backend.set("c", b"3".to_vec(), None).await.unwrap();

        let values = backend
            .mget(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(values, vec![Some(b"1".to_vec()), None, Some(b"3".to_vec())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_reaps_expired_keys() {
        let backend = MemoryBackend::new();
        let shutdown = CancellationToken::new();
        let handle = backend.spawn_sweeper(Duration::from_secs(1), shutdown.clone());

        backend
            .set("k", b"v".to_vec(), Some(Duration::from_millis(500)))
            .await
            .unwrap();
        assert_eq!(backend.stored_keys().await, 1);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(backend.stored_keys().await, 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
