//! User records and the email index

use super::{encode, RecordStore, StoreError, StoreResult};
use crate::codec;
use crate::context::OpContext;
use crate::keys::{email_index_key, user_key};
use crate::models::User;

impl RecordStore {
    /// Writes a user record
    ///
    /// Unconditional: an existing record under the same id is overwritten
    /// and email uniqueness is not checked. Use
    /// [`RecordStore::register_user`] for the check-then-write flow.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for an unusable id, `Write`/`Connection` if the backend
    /// fails.
    pub async fn create_user(&self, ctx: &OpContext, user: &User) -> StoreResult<()> {
        let key = user_key(&user.id)?;
        let value = encode("user", &user.id, user)?;

        self.write(ctx, &key, self.backend.set(&key, value, None))
            .await?;

        tracing::debug!(user_id = %user.id, "Created user");
        Ok(())
    }

    /// Fetches a user by id
    ///
    /// # Errors
    ///
    /// `NotFound` if no record exists, `Decode` if it is malformed.
    pub async fn get_user(&self, ctx: &OpContext, id: &str) -> StoreResult<User> {
        let key = user_key(id)?;
        let user = self.fetch(ctx, "user", id, key).await?;

        tracing::trace!(user_id = %id, "Loaded user");
        Ok(user)
    }

    /// Resolves a user through the email index
    ///
    /// Two sequential reads: the index entry, then the user record. An
    /// index entry pointing at a user whose email no longer matches is
    /// reported as `NotFound` and left in place.
    ///
    /// # Errors
    ///
    /// `NotFound` if either read misses, `Decode` if either value is
    /// malformed.
    pub async fn get_user_by_email(&self, ctx: &OpContext, email: &str) -> StoreResult<User> {
        let key = email_index_key(email)?;
        let raw = self
            .read(ctx, &key, self.backend.get(&key))
            .await?
            .ok_or_else(|| StoreError::not_found("user", email))?;
        let user_id = codec::decode_id(raw).map_err(|source| StoreError::Decode {
            key: key.clone(),
            source,
        })?;

        let user = self.get_user(ctx, &user_id).await?;
        if user.email != email {
            tracing::warn!(
                user_id = %user.id,
                "Email index entry points at a user with a different email"
            );
            return Err(StoreError::not_found("user", email));
        }

        Ok(user)
    }

    /// Points the email index entry for `email` at `user_id`
    ///
    /// Separate from [`RecordStore::create_user`] and not atomic with it.
    pub async fn set_email_index(
        &self,
        ctx: &OpContext,
        email: &str,
        user_id: &str,
    ) -> StoreResult<()> {
        let key = email_index_key(email)?;
        // Validate the id the entry will resolve to
        user_key(user_id)?;

        self.write(
            ctx,
            &key,
            self.backend.set(&key, user_id.as_bytes().to_vec(), None),
        )
        .await?;

        tracing::debug!(user_id = %user_id, "Set email index");
        Ok(())
    }

    /// Registers a user: email check, user record, then email index
    ///
    /// The check and the two writes are separate round trips, so two
    /// concurrent registrations for the same email can both succeed; the
    /// later index write wins.
    ///
    /// # Errors
    ///
    /// `EmailTaken` if the email already resolves to a user, otherwise any
    /// error from the underlying operations.
    pub async fn register_user(&self, ctx: &OpContext, user: &User) -> StoreResult<()> {
        match self.get_user_by_email(ctx, &user.email).await {
            Ok(_) => return Err(StoreError::EmailTaken(user.email.clone())),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }

        self.create_user(ctx, user).await?;
        self.set_email_index(ctx, &user.email, &user.id).await?;

        tracing::info!(user_id = %user.id, "Registered user");
        Ok(())
    }
}
