//! Session record
//!
//! A session is a bearer token (its `id`) bound to a user for a bounded
//! window. The store writes it with a time-to-live of `expires_at - now`
//! and never sweeps sessions itself.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validity window used by the login flow
pub const DEFAULT_SESSION_LIFETIME_HOURS: i64 = 24;

/// Authenticated session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    /// Opaque session ID, acts as the bearer token
    pub id: String,

    /// User this session authenticates (reference only, not ownership)
    pub user_id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// When the session stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for `user_id` valid for `lifetime` from now
    pub fn new(user_id: impl Into<String>, lifetime: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at,
            expires_at: created_at + lifetime,
        }
    }

    /// Whether the session is expired at `now` (expiry is inclusive)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Remaining lifetime at `now`, or `None` once expired
    ///
    /// This is the time-to-live handed to the backing store.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expires_at - now)
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
    }
}
