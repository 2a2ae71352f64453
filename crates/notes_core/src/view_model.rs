use chrono::{DateTime, Utc};

use crate::{TaskId, TaskStatus};

/// Snapshot handed to UI consumers whenever the book changes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskListView {
    pub rows: Vec<TaskRowView>,
    pub current: Option<TaskDetailView>,
    pub pending_count: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRowView {
    pub task_id: TaskId,
    pub title: String,
    pub platform: String,
    pub status: TaskStatus,
    pub can_retry: bool,
    pub version_count: usize,
    pub created_at: DateTime<Utc>,
}

/// The selected task. `markdown` is always the newest version.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDetailView {
    pub task_id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub can_retry: bool,
    pub markdown: Option<String>,
    pub versions: Vec<VersionView>,
    pub segment_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionView {
    pub ver_id: String,
    pub style: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}
