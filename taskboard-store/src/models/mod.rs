//! Record types persisted by the store
//!
//! # Models
//!
//! - `user`: User accounts (`user:{id}`, indexed by `user:email:{email}`)
//! - `session`: Login sessions with a bounded lifetime (`session:{id}`)
//! - `task`: Task items owned by a single user (`task:{id}`, indexed by
//!   `user:{user_id}:tasks`)
//! - `stats`: Per-user task counters derived from a listing
//!
//! Every record is serialized as a self-describing JSON object. Missing
//! fields decode to the field type's default value, so older or partial
//! records never fail to load for that reason alone.

pub mod session;
pub mod stats;
pub mod task;
pub mod user;

pub use session::{Session, DEFAULT_SESSION_LIFETIME_HOURS};
pub use stats::DashboardStats;
pub use task::{ParseTaskFieldError, Task, TaskPatch, TaskPriority, TaskStatus};
pub use user::User;
