//! Common test utilities for integration tests
//!
//! - In-memory store construction
//! - Redis-backed store construction (for `#[ignore]`d tests)
//! - Record builders with fixed, distinct creation times

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use taskboard_store::backend::MemoryBackend;
use taskboard_store::models::{Task, TaskPriority, User};
use taskboard_store::redis::RedisConfig;
use taskboard_store::{RecordStore, StoreConfig};

/// Store on a fresh in-memory backend, plus a handle to that backend
pub fn memory_store() -> (RecordStore, MemoryBackend) {
    let backend = MemoryBackend::new();
    (
        RecordStore::new(backend.clone(), StoreConfig::default()),
        backend,
    )
}

/// Store on the Redis instance at `REDIS_URL` (default localhost)
pub async fn redis_store() -> anyhow::Result<RecordStore> {
    let config = RedisConfig::from_env()
        .unwrap_or_else(|_| RedisConfig::new("redis://localhost:6379"));
    Ok(RecordStore::connect(config).await?)
}

/// A user with a unique email
pub fn test_user() -> User {
    let user = User::new("", "$argon2id$test-hash", "Test User");
    User {
        email: format!("test-{}@example.com", user.id),
        ..user
    }
}

/// A task for `user_id` created `offset_ms` after a fixed base time
pub fn task_at(user_id: &str, title: &str, offset_ms: i64) -> Task {
    let base: DateTime<Utc> = DateTime::parse_from_rfc3339("2025-01-03T12:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc);
    let mut task = Task::new(user_id, title, format!("{} description", title), TaskPriority::Medium);
    task.created_at = base + Duration::milliseconds(offset_ms);
    task.updated_at = task.created_at;
    task
}
