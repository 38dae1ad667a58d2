//! # Taskboard Store
//!
//! Storage core for the taskboard: users, sessions and tasks persisted on a
//! single-key key-value store (Redis), with the secondary structures the
//! store does not provide natively.
//!
//! ## Module Organization
//!
//! - `models`: Record types and partial updates
//! - `keys`: Key scheme (`user:{id}`, `user:email:{email}`, `session:{id}`,
//!   `task:{id}`, `user:{user_id}:tasks`)
//! - `codec`: Self-describing JSON record encoding
//! - `backend`: Key-value backend trait, Redis and in-memory backends
//! - `redis`: Redis connection management and configuration
//! - `context`: Per-operation cancellation and deadlines
//! - `store`: The record store and its error type

pub mod backend;
pub mod codec;
pub mod context;
pub mod keys;
pub mod models;
pub mod redis;
pub mod store;

pub use context::OpContext;
pub use store::{RecordStore, StoreConfig, StoreError, StoreResult};

/// Current version of the taskboard store library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
