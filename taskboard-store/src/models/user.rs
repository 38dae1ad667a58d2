//! User account record
//!
//! Users are created once at registration and never updated by the store.
//! Email uniqueness is not enforced here; it relies on the email index
//! (`user:email:{email}`) being checked before creation, which is racy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User model representing a registered account
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    /// Opaque unique user ID (UUID v4 string for users created via `User::new`)
    pub id: String,

    /// Email address, unique across users via the email index
    pub email: String,

    /// Password credential hash
    ///
    /// Produced by the caller's hashing scheme. Never logged: the `Debug`
    /// implementation redacts it.
    pub password_hash: String,

    /// Display name
    pub name: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with a fresh UUID v4 id and `created_at = now`
    ///
    /// # Arguments
    ///
    /// * `email` - Email address
    /// * `password_hash` - Already-hashed credential (NOT plaintext)
    /// * `name` - Display name
    pub fn new(
        email: impl Into<String>,
        password_hash: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.into(),
            password_hash: password_hash.into(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish()
    }
}
