//! Record store
//!
//! [`RecordStore`] persists users, sessions and tasks on a [`KvBackend`]
//! and keeps two derived indexes alongside the primary records:
//!
//! ```text
//! user:email:{email}    -> user id            (SetEmailIndex)
//! user:{user_id}:tasks  -> {task id: created} (CreateTask / DeleteTask)
//! ```
//!
//! # Consistency
//!
//! There are no cross-key transactions. The email index is written by a
//! separate call after the user record; a task record and its index entry
//! are written in one non-atomic [`Batch`](crate::backend::Batch). Known
//! windows where they diverge:
//!
//! - a failure between `create_user` and `set_email_index` leaves a user
//!   unreachable by email
//! - a listing racing `delete_task` can see an index entry whose record is
//!   gone (listings skip such entries)
//! - `update_task` racing `delete_task` can re-create a record whose index
//!   entry was already removed
//!
//! Callers needing stronger guarantees must add reconciliation above the
//! store.
//!
//! # Example
//!
//! ```no_run
//! use taskboard_store::models::{Task, TaskPriority, User};
//! use taskboard_store::redis::RedisConfig;
//! use taskboard_store::{OpContext, RecordStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RecordStore::connect(RedisConfig::from_env()?).await?;
//! let ctx = OpContext::background();
//!
//! let user = User::new("ada@example.com", "$argon2id$...", "Ada");
//! store.register_user(&ctx, &user).await?;
//!
//! let task = Task::new(&user.id, "Write report", "", TaskPriority::High);
//! store.create_task(&ctx, &task).await?;
//!
//! let tasks = store.get_user_tasks(&ctx, &user.id, None).await?;
//! assert_eq!(tasks.len(), 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod sessions;
mod tasks;
mod users;

pub use error::StoreError;

use crate::backend::{BackendError, KvBackend, MemoryBackend, RedisBackend};
use crate::codec;
use crate::context::OpContext;
use crate::models::{Session, DEFAULT_SESSION_LIFETIME_HOURS};
use crate::redis::{RedisClient, RedisClientError, RedisConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Store behaviour settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Deadline applied to each backend round trip when the caller's
    /// context has none (or a later one)
    pub command_timeout: Duration,

    /// Validity window for sessions built with [`RecordStore::new_session`]
    pub session_lifetime: chrono::Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(10),
            session_lifetime: chrono::Duration::hours(DEFAULT_SESSION_LIFETIME_HOURS),
        }
    }
}

/// Typed record store over a shared key-value backend
///
/// Cheap to clone; clones share the backend handle. Holds no other
/// mutable state, so it can be used from any number of tasks at once.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KvBackend>,
    config: StoreConfig,
}

impl RecordStore {
    /// Creates a store on `backend`
    pub fn new(backend: impl KvBackend + 'static, config: StoreConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    /// Creates a store on an already shared backend
    pub fn with_backend(backend: Arc<dyn KvBackend>, config: StoreConfig) -> Self {
        Self { backend, config }
    }

    /// Connects to Redis and creates a store on it
    ///
    /// The command timeout is taken from `redis_config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn connect(redis_config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = RedisClient::new(redis_config).await?;
        let config = StoreConfig {
            command_timeout: client.config().command_timeout(),
            ..StoreConfig::default()
        };
        Ok(Self::new(RedisBackend::new(client), config))
    }

    /// Creates a store on a fresh [`MemoryBackend`]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new(), StoreConfig::default())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Builds a session for `user_id` using the configured lifetime
    ///
    /// Nothing is written; pass the result to [`RecordStore::create_session`].
    pub fn new_session(&self, user_id: impl Into<String>) -> Session {
        Session::new(user_id, self.config.session_lifetime)
    }

    /// Health check
    pub async fn ping(&self, ctx: &OpContext) -> StoreResult<bool> {
        self.call(ctx, self.backend.ping())
            .await?
            .map_err(|err| StoreError::from_read("PING", err))
    }

    /// Runs one backend round trip under the context's cancellation and
    /// deadline
    async fn call<T, F>(&self, ctx: &OpContext, fut: F) -> StoreResult<Result<T, BackendError>>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        Ok(ctx.run(self.config.command_timeout, fut).await?)
    }

    async fn read<T, F>(&self, ctx: &OpContext, key: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        self.call(ctx, fut)
            .await?
            .map_err(|err| StoreError::from_read(key, err))
    }

    async fn write<T, F>(&self, ctx: &OpContext, key: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        self.call(ctx, fut)
            .await?
            .map_err(|err| StoreError::from_write(key, err))
    }

    /// GET + decode; `NotFound` if the key is absent
    async fn fetch<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        kind: &'static str,
        id: &str,
        key: String,
    ) -> StoreResult<T> {
        let bytes = self
            .read(ctx, &key, self.backend.get(&key))
            .await?
            .ok_or_else(|| StoreError::not_found(kind, id))?;

        codec::decode(&bytes).map_err(|source| StoreError::Decode { key, source })
    }
}

fn encode<T: Serialize>(kind: &'static str, id: &str, record: &T) -> StoreResult<Vec<u8>> {
    codec::encode(record).map_err(|source| StoreError::Encode {
        kind,
        id: id.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Batch;
    use async_trait::async_trait;

    /// Backend whose every call hangs or fails, for error-path tests
    struct BrokenBackend {
        hang: bool,
    }

    impl BrokenBackend {
        async fn fail<T>(&self) -> Result<T, BackendError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            Err(BackendError::Connection("connection reset".to_string()))
        }
    }

    #[async_trait]
    impl KvBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
            self.fail().await
        }
        async fn set(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Option<Duration>,
        ) -> Result<(), BackendError> {
            self.fail().await
        }
        async fn del(&self, _key: &str) -> Result<bool, BackendError> {
            self.fail().await
        }
        async fn mget(&self, _keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, BackendError> {
            self.fail().await
        }
        async fn zrange_all(&self, _key: &str) -> Result<Vec<String>, BackendError> {
            self.fail().await
        }
        async fn exec_batch(&self, _batch: Batch) -> Result<(), BackendError> {
            self.fail().await
        }
        async fn ping(&self) -> Result<bool, BackendError> {
            self.fail().await
        }
    }

    #[tokio::test]
    async fn test_connection_errors_surface() {
        let store = RecordStore::new(BrokenBackend { hang: false }, StoreConfig::default());
        let ctx = OpContext::background();

        assert!(matches!(
            store.get_user(&ctx, "u1").await,
            Err(StoreError::Connection(_))
        ));
        assert!(matches!(
            store.delete_session(&ctx, "s1").await,
            Err(StoreError::Connection(_))
        ));
        assert!(matches!(
            store.ping(&ctx).await,
            Err(StoreError::Connection(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_timeout() {
        let config = StoreConfig {
            command_timeout: Duration::from_millis(50),
            ..StoreConfig::default()
        };
        let store = RecordStore::new(BrokenBackend { hang: true }, config);

        let result = store.get_task(&OpContext::background(), "t1").await;
        assert!(matches!(result, Err(StoreError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let store = RecordStore::new(BrokenBackend { hang: true }, StoreConfig::default());
        let ctx = OpContext::background();
        ctx.cancellation_token().cancel();

        let result = store.get_session(&ctx, "s1").await;
        assert!(matches!(result, Err(StoreError::Cancelled)));
    }

    #[tokio::test]
    async fn test_new_session_uses_configured_lifetime() {
        let config = StoreConfig {
            session_lifetime: chrono::Duration::minutes(30),
            ..StoreConfig::default()
        };
        let store = RecordStore::new(MemoryBackend::new(), config);

        assert_eq!(store.config().session_lifetime, chrono::Duration::minutes(30));
        let session = store.new_session("u1");
        assert_eq!(
            session.expires_at - session.created_at,
            chrono::Duration::minutes(30)
        );
    }

    #[tokio::test]
    async fn test_in_memory_ping() {
        let store = RecordStore::in_memory();
        assert!(store.ping(&OpContext::background()).await.unwrap());
    }
}
