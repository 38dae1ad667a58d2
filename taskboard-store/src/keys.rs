//! Key scheme
//!
//! Maps each entity to its storage key:
//!
//! ```text
//! user:{id}              User record (JSON)
//! user:email:{email}     Email index, holds the raw user id
//! session:{id}           Session record (JSON, with TTL)
//! task:{id}              Task record (JSON)
//! user:{user_id}:tasks   Sorted set of task ids scored by creation time
//! ```
//!
//! Identifiers may not be empty or contain `:`, and a user id may not be the
//! literal `email`. With those rules no two (type, id) pairs map to the same
//! key: `user:{id}` has exactly one separator, `user:{id}:tasks` has two with
//! a non-`email` middle segment, and `user:email:{email}` always has `email`
//! as its middle segment. Emails are free-form since they are the trailing
//! segment of a reserved prefix.

use thiserror::Error;

const EMAIL_SEGMENT: &str = "email";

/// Invalid identifier for key construction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Identifier was empty
    #[error("Empty {0} identifier")]
    Empty(&'static str),

    /// Identifier contains the key separator
    #[error("Invalid {kind} identifier {id:?}: must not contain ':'")]
    ContainsSeparator { kind: &'static str, id: String },

    /// Identifier collides with a reserved key segment
    #[error("Invalid {kind} identifier {id:?}: reserved")]
    Reserved { kind: &'static str, id: String },
}

fn check_id(kind: &'static str, id: &str) -> Result<(), KeyError> {
    if id.is_empty() {
        return Err(KeyError::Empty(kind));
    }
    if id.contains(':') {
        return Err(KeyError::ContainsSeparator {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

fn check_user_id(id: &str) -> Result<(), KeyError> {
    check_id("user", id)?;
    if id == EMAIL_SEGMENT {
        return Err(KeyError::Reserved {
            kind: "user",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Key of a user record: `user:{id}`
pub fn user_key(id: &str) -> Result<String, KeyError> {
    check_user_id(id)?;
    Ok(format!("user:{}", id))
}

/// Key of an email index entry: `user:email:{email}`
pub fn email_index_key(email: &str) -> Result<String, KeyError> {
    if email.is_empty() {
        return Err(KeyError::Empty("email"));
    }
    Ok(format!("user:{}:{}", EMAIL_SEGMENT, email))
}

/// Key of a session record: `session:{id}`
pub fn session_key(id: &str) -> Result<String, KeyError> {
    check_id("session", id)?;
    Ok(format!("session:{}", id))
}

/// Key of a task record: `task:{id}`
pub fn task_key(id: &str) -> Result<String, KeyError> {
    check_id("task", id)?;
    Ok(format!("task:{}", id))
}

/// Key of a user's task index: `user:{user_id}:tasks`
pub fn user_tasks_key(user_id: &str) -> Result<String, KeyError> {
    check_user_id(user_id)?;
    Ok(format!("user:{}:tasks", user_id))
}

/// Validates a task id used as a sorted-set member
pub fn task_member(id: &str) -> Result<&str, KeyError> {
    check_id("task", id)?;
    Ok(id)
}
