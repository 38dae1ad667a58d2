//! Task records and the per-user task index
//!
//! `user:{user_id}:tasks` is a sorted set of task ids scored by creation
//! time in microseconds. It is a best-effort cache of which tasks a user
//! owns, kept in step with the records by batched writes on create and
//! delete. Listings treat the task records as the source of truth.

use super::{encode, RecordStore, StoreError, StoreResult};
use crate::backend::Batch;
use crate::codec;
use crate::context::OpContext;
use crate::keys::{task_key, task_member, user_tasks_key};
use crate::models::{DashboardStats, Task, TaskPatch, TaskStatus};
use chrono::Utc;

impl RecordStore {
    /// Writes a task record and adds it to its owner's index
    ///
    /// Both writes go out in one round trip as a non-atomic batch.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for an unusable task or user id, `Write`/`Connection`
    /// if the batch fails (either write may still have applied).
    pub async fn create_task(&self, ctx: &OpContext, task: &Task) -> StoreResult<()> {
        let key = task_key(&task.id)?;
        let index = user_tasks_key(&task.user_id)?;
        let value = encode("task", &task.id, task)?;

        let batch = Batch::new()
            .set(key.as_str(), value)
            .zadd(index, task.id.as_str(), task.index_score());

        self.write(ctx, &key, self.backend.exec_batch(batch))
            .await?;

        tracing::debug!(task_id = %task.id, user_id = %task.user_id, "Created task");
        Ok(())
    }

    /// Fetches a task by id
    ///
    /// Does not check ownership.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record exists, `Decode` if it is malformed.
    pub async fn get_task(&self, ctx: &OpContext, id: &str) -> StoreResult<Task> {
        let key = task_key(id)?;
        let task = self.fetch(ctx, "task", id, key).await?;

        tracing::trace!(task_id = %id, "Loaded task");
        Ok(task)
    }

    /// Overwrites a task record, refreshing `updated_at` first
    ///
    /// `updated_at` always moves strictly forward. The owner's index is not
    /// touched: id and owner are fixed for a task's lifetime.
    pub async fn update_task(&self, ctx: &OpContext, task: &mut Task) -> StoreResult<()> {
        let key = task_key(&task.id)?;

        let now = Utc::now();
        task.updated_at = if now > task.updated_at {
            now
        } else {
            task.updated_at + chrono::Duration::microseconds(1)
        };
        let value = encode("task", &task.id, &*task)?;

        self.write(ctx, &key, self.backend.set(&key, value, None))
            .await?;

        tracing::debug!(task_id = %task.id, status = %task.status, "Updated task");
        Ok(())
    }

    /// Deletes a task record and removes it from `user_id`'s index
    ///
    /// Both writes go out in one round trip as a non-atomic batch. Deleting
    /// a task that does not exist is not an error.
    pub async fn delete_task(&self, ctx: &OpContext, user_id: &str, task_id: &str) -> StoreResult<()> {
        let key = task_key(task_id)?;
        let index = user_tasks_key(user_id)?;

        let batch = Batch::new().del(key.as_str()).zrem(index, task_id);

        self.write(ctx, &key, self.backend.exec_batch(batch))
            .await?;

        tracing::debug!(task_id = %task_id, user_id = %user_id, "Deleted task");
        Ok(())
    }

    /// Lists a user's tasks in creation order
    ///
    /// Resolves the index, fetches every referenced record in one round
    /// trip and keeps those matching `status` (all when `None`).
    ///
    /// Results are ordered by `created_at`. Tasks built with [`Task::new`]
    /// in one process never share a creation microsecond, so their order
    /// matches creation order. Remaining ties (tasks from different
    /// processes, or hand-set timestamps) keep index order: ascending task
    /// id.
    ///
    /// Index entries with no backing record, or whose record belongs to
    /// another user, are skipped with a warning: the index is a cache, and
    /// a concurrent delete can leave such entries visible briefly.
    ///
    /// # Errors
    ///
    /// `Decode` if a referenced record is malformed; backend failures as
    /// usual.
    pub async fn get_user_tasks(
        &self,
        ctx: &OpContext,
        user_id: &str,
        status: Option<TaskStatus>,
    ) -> StoreResult<Vec<Task>> {
        let index = user_tasks_key(user_id)?;
        let members = self
            .read(ctx, &index, self.backend.zrange_all(&index))
            .await?;

        let mut ids = Vec::with_capacity(members.len());
        let mut keys = Vec::with_capacity(members.len());
        for member in members {
            match task_member(&member).and_then(task_key) {
                Ok(key) => {
                    keys.push(key);
                    ids.push(member);
                }
                Err(err) => {
                    tracing::warn!(user_id = %user_id, error = %err, "Skipping invalid task index entry");
                }
            }
        }

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values = self
            .read(ctx, &index, self.backend.mget(&keys))
            .await?;

        let mut tasks = Vec::with_capacity(values.len());
        for ((id, key), value) in ids.iter().zip(keys).zip(values) {
            let Some(bytes) = value else {
                tracing::warn!(task_id = %id, user_id = %user_id, "Task index entry has no record, skipping");
                continue;
            };

            let task: Task =
                codec::decode(&bytes).map_err(|source| StoreError::Decode { key, source })?;

            if task.user_id != user_id {
                tracing::warn!(task_id = %id, user_id = %user_id, "Task index entry owned by another user, skipping");
                continue;
            }

            if status.map_or(true, |wanted| task.status == wanted) {
                tasks.push(task);
            }
        }

        // Index scores are whole microseconds; sub-microsecond ties keep
        // index order
        tasks.sort_by_key(|task| task.created_at);

        tracing::trace!(user_id = %user_id, count = tasks.len(), "Listed tasks");
        Ok(tasks)
    }

    /// Applies a partial update to a task owned by `user_id`
    ///
    /// Returns the task as written.
    ///
    /// # Errors
    ///
    /// `NotFound` if the task is missing or owned by another user.
    pub async fn patch_task(
        &self,
        ctx: &OpContext,
        user_id: &str,
        task_id: &str,
        patch: TaskPatch,
    ) -> StoreResult<Task> {
        let mut task = self.get_task(ctx, task_id).await?;
        if task.user_id != user_id {
            return Err(StoreError::not_found("task", task_id));
        }

        patch.apply(&mut task);
        self.update_task(ctx, &mut task).await?;
        Ok(task)
    }

    /// Counts a user's tasks by status and priority
    pub async fn get_dashboard_stats(
        &self,
        ctx: &OpContext,
        user_id: &str,
    ) -> StoreResult<DashboardStats> {
        let tasks = self.get_user_tasks(ctx, user_id, None).await?;
        Ok(DashboardStats::from_tasks(&tasks))
    }
}
