//! Dashboard counters

use crate::models::task::{Task, TaskPriority, TaskStatus};
use serde::{Deserialize, Serialize};

/// Per-user task counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub completed_tasks: usize,
    pub high_priority_tasks: usize,
}

impl DashboardStats {
    /// Tallies counters over a task listing
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut stats, task| {
            stats.total_tasks += 1;
            match task.status {
                TaskStatus::Pending => stats.pending_tasks += 1,
                TaskStatus::InProgress => stats.in_progress_tasks += 1,
                TaskStatus::Completed => stats.completed_tasks += 1,
            }
            if task.priority == TaskPriority::High {
                stats.high_priority_tasks += 1;
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tasks() {
        let mut done = Task::new("u1", "a", "", TaskPriority::High);
        done.status = TaskStatus::Completed;
        let mut doing = Task::new("u1", "b", "", TaskPriority::Low);
        doing.status = TaskStatus::InProgress;
        let todo = Task::new("u1", "c", "", TaskPriority::High);

        let stats = DashboardStats::from_tasks(&[done, doing, todo]);

        assert_eq!(
            stats,
            DashboardStats {
                total_tasks: 3,
                pending_tasks: 1,
                in_progress_tasks: 1,
                completed_tasks: 1,
                high_priority_tasks: 2,
            }
        );
    }

    #[test]
    fn test_empty_listing() {
        assert_eq!(DashboardStats::from_tasks(&[]), DashboardStats::default());
    }
}
