use chrono::{DateTime, Utc};

use crate::{FormData, TaskId, TaskPatch, TaskSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The service accepted a new job.
    TaskSubmitted {
        task_id: TaskId,
        platform: String,
        form_data: FormData,
        at: DateTime<Utc>,
    },
    /// A status query returned for a task.
    StatusReported {
        task_id: TaskId,
        patch: TaskPatch,
        at: DateTime<Utc>,
    },
    /// The service accepted a regeneration of an existing task.
    TaskResubmitted { task_id: TaskId, form_data: FormData },
    /// User picked a task, or cleared the selection.
    TaskSelected(Option<TaskId>),
    /// User deleted a task.
    TaskRemoved(TaskId),
    /// User dropped every task.
    TasksCleared,
    /// Replace the book with persisted state.
    TasksRestored(TaskSnapshot),
}
