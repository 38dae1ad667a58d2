//! Task model
//!
//! Tasks are owned by exactly one user. The owner never changes after
//! creation, so updates only rewrite the `task:{id}` record and leave the
//! per-user index alone.
//!
//! # Status
//!
//! ```text
//! pending ⇄ in_progress ⇄ completed
//! ```
//!
//! Any status may be set from any other; the store does not enforce a
//! state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Error parsing a status or priority from its string form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field}: {value:?}")]
pub struct ParseTaskFieldError {
    /// Which field failed to parse ("status" or "priority")
    pub field: &'static str,

    /// The rejected input
    pub value: String,
}

/// Task progress status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet
    #[default]
    Pending,

    /// Being worked on
    InProgress,

    /// Done
    Completed,
}

impl TaskStatus {
    /// Converts status to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseTaskFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            other => Err(ParseTaskFieldError {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    /// Converts priority to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ParseTaskFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(ParseTaskFieldError {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }
}

/// Task model representing a user's to-do item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    /// Opaque unique task ID
    pub id: String,

    /// Owning user (all reads and writes are scoped by it)
    pub user_id: String,

    /// Short title
    pub title: String,

    /// Free-form description, may be empty
    pub description: String,

    /// Current status
    pub status: TaskStatus,

    /// Priority
    pub priority: TaskPriority,

    /// When the task was created; also its position in the owner's index
    pub created_at: DateTime<Utc>,

    /// When the task was last written
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new pending task for `user_id`
    ///
    /// `created_at` and `updated_at` are both set to now, truncated to
    /// microseconds. Successive calls in one process always get strictly
    /// increasing creation times, so their index scores never tie.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        priority: TaskPriority,
    ) -> Self {
        let now = next_created_at();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            priority,
            created_at: now,
            updated_at: now,
        }
    }

    /// Score of this task in the owner's index (microseconds since epoch)
    ///
    /// Microseconds stay well inside the exact integer range of an `f64`.
    pub fn index_score(&self) -> f64 {
        self.created_at.timestamp_micros() as f64
    }
}

/// Last creation time handed out by [`Task::new`], in microseconds
static LAST_CREATED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current time in whole microseconds, bumped past the previous call's
fn next_created_at() -> DateTime<Utc> {
    let now = Utc::now();
    let now_micros = now.timestamp_micros();

    let previous = LAST_CREATED_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now_micros.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    let micros = now_micros.max(previous.saturating_add(1));

    let sub_micro = i64::from(now.timestamp_subsec_nanos() % 1_000);
    now - chrono::Duration::nanoseconds(sub_micro) + chrono::Duration::microseconds(micros - now_micros)
}

/// Partial update for a task
///
/// `None` keeps the existing value; `Some` overwrites it. An explicit
/// `Some(String::new())` clears the description, which is distinct from
/// leaving it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    /// Builds a patch from request form fields where empty means absent
    ///
    /// # Errors
    ///
    /// Returns an error if a non-empty status or priority is not one of the
    /// known values.
    pub fn from_form(
        title: &str,
        description: &str,
        status: &str,
        priority: &str,
    ) -> Result<Self, ParseTaskFieldError> {
        fn present(value: &str) -> Option<&str> {
            (!value.is_empty()).then_some(value)
        }

        Ok(Self {
            title: present(title).map(str::to_string),
            description: present(description).map(str::to_string),
            status: present(status).map(str::parse).transpose()?,
            priority: present(priority).map(str::parse).transpose()?,
        })
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
    }

    /// Applies present fields to `task`
    ///
    /// Does not touch `updated_at`; the store refreshes it on write.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
    }
}
