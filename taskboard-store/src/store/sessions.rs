//! Session records
//!
//! Expiry is delegated to the backend's per-key TTL: the store computes
//! `expires_at - now` at write time and passes it through. Reads also
//! reject a decoded session whose `expires_at` has passed, so a session is
//! never served at or after its expiry even if the backend has not reaped
//! it yet.

use super::{encode, RecordStore, StoreError, StoreResult};
use crate::context::OpContext;
use crate::keys::session_key;
use crate::models::Session;
use chrono::Utc;
use std::time::Duration;

impl RecordStore {
    /// Writes a session with a TTL matching its validity window
    ///
    /// A session whose `expires_at` is not in the future is still accepted,
    /// but is immediately unreadable.
    pub async fn create_session(&self, ctx: &OpContext, session: &Session) -> StoreResult<()> {
        let key = session_key(&session.id)?;
        let value = encode("session", &session.id, session)?;

        let ttl = match session.remaining_ttl(Utc::now()) {
            Some(ttl) => ttl,
            None => {
                tracing::warn!(
                    user_id = %session.user_id,
                    expires_at = %session.expires_at,
                    "Session written already expired"
                );
                Duration::ZERO
            }
        };

        self.write(ctx, &key, self.backend.set(&key, value, Some(ttl)))
            .await?;

        tracing::debug!(
            user_id = %session.user_id,
            ttl_ms = ttl.as_millis() as u64,
            "Created session"
        );
        Ok(())
    }

    /// Fetches a live session
    ///
    /// # Errors
    ///
    /// `NotFound` if absent, reaped, or past its `expires_at`.
    pub async fn get_session(&self, ctx: &OpContext, id: &str) -> StoreResult<Session> {
        let key = session_key(id)?;
        let session: Session = self.fetch(ctx, "session", id, key).await?;

        if session.is_expired_at(Utc::now()) {
            return Err(StoreError::not_found("session", id));
        }

        tracing::trace!(user_id = %session.user_id, "Loaded session");
        Ok(session)
    }

    /// Deletes a session; deleting a missing session is not an error
    pub async fn delete_session(&self, ctx: &OpContext, id: &str) -> StoreResult<()> {
        let key = session_key(id)?;
        let existed = self.write(ctx, &key, self.backend.del(&key)).await?;

        tracing::debug!(existed, "Deleted session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::{KvBackend, MemoryBackend};
    use crate::context::OpContext;
    use crate::models::Session;
    use crate::store::{RecordStore, StoreConfig};
    use chrono::{Duration, Utc};

    fn store() -> (RecordStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        (
            RecordStore::new(backend.clone(), StoreConfig::default()),
            backend,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let session = Session::new("u1", Duration::hours(24));

        store.create_session(&ctx, &session).await.unwrap();

        assert_eq!(store.get_session(&ctx, &session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_past_expiry_is_unreadable_not_an_error() {
        let (store, backend) = store();
        let ctx = OpContext::background();
        let mut session = Session::new("u1", Duration::hours(1));
        session.expires_at = Utc::now() - Duration::seconds(5);

        store.create_session(&ctx, &session).await.unwrap();

        assert!(store
            .get_session(&ctx, &session.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert_eq!(backend.stored_keys().await, 0);
    }

    #[tokio::test]
    async fn test_expired_session_overwrites_live_one() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let mut session = Session::new("u1", Duration::hours(1));
        store.create_session(&ctx, &session).await.unwrap();

        session.expires_at = session.created_at;
        store.create_session(&ctx, &session).await.unwrap();

        assert!(store
            .get_session(&ctx, &session.id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_stale_record_rejected_on_read() {
        let (store, backend) = store();
        let mut session = Session::new("u1", Duration::hours(1));
        session.expires_at = Utc::now() - Duration::seconds(1);

        // Written without TTL, as if the backend had not reaped it yet
        backend
            .set(
                &format!("session:{}", session.id),
                serde_json::to_vec(&session).unwrap(),
                None,
            )
            .await
            .unwrap();

        assert!(store
            .get_session(&OpContext::background(), &session.id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_delete_session_idempotent() {
        let (store, _) = store();
        let ctx = OpContext::background();
        let session = Session::new("u1", Duration::hours(1));
        store.create_session(&ctx, &session).await.unwrap();

        store.delete_session(&ctx, &session.id).await.unwrap();
        store.delete_session(&ctx, &session.id).await.unwrap();

        assert!(store
            .get_session(&ctx, &session.id)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
