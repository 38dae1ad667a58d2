//! Store error taxonomy
//!
//! Every operation surfaces the specific failure to its caller. The store
//! never retries and never substitutes defaults; deciding how a failure
//! maps to a user-visible response is the request layer's job.

use crate::backend::BackendError;
use crate::codec::CodecError;
use crate::context::Interrupted;
use crate::keys::KeyError;
use thiserror::Error;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key absent or expired
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Stored bytes do not parse as the expected record shape
    #[error("Failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: CodecError,
    },

    /// Record could not be encoded for writing
    #[error("Failed to encode {kind} {id}: {source}")]
    Encode {
        kind: &'static str,
        id: String,
        #[source]
        source: CodecError,
    },

    /// Backend rejected or failed to apply a write or batch
    #[error("Write to {key} failed: {reason}")]
    Write { key: String, reason: String },

    /// Backend rejected a read (e.g. key holds the wrong type)
    #[error("Read of {key} failed: {reason}")]
    Read { key: String, reason: String },

    /// Transport-level failure; retryable at the caller's discretion
    #[error("Connection error: {0}")]
    Connection(String),

    /// Identifier cannot be mapped to a key
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// Registration found an existing email index entry
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// The operation's context was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// The operation's deadline passed before the backend answered
    #[error("Operation deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether this is a `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether retrying the same call could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Connection(_) | StoreError::DeadlineExceeded
        )
    }

    /// Maps a backend failure on a write path
    pub(crate) fn from_write(key: &str, err: BackendError) -> Self {
        match err {
            BackendError::Connection(msg) => StoreError::Connection(msg),
            BackendError::Command(reason) => StoreError::Write {
                key: key.to_string(),
                reason,
            },
        }
    }

    /// Maps a backend failure on a read path
    pub(crate) fn from_read(key: &str, err: BackendError) -> Self {
        match err {
            BackendError::Connection(msg) => StoreError::Connection(msg),
            BackendError::Command(reason) => StoreError::Read {
                key: key.to_string(),
                reason,
            },
        }
    }
}

impl From<Interrupted> for StoreError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::Cancelled => StoreError::Cancelled,
            Interrupted::DeadlineExceeded => StoreError::DeadlineExceeded,
        }
    }
}
