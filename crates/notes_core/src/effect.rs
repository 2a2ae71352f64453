use crate::{TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the service to release what it holds for a deleted task.
    DeleteRemoteJob {
        task_id: TaskId,
        video_id: String,
        platform: String,
    },
    /// A deleted task never resolved its source video; the service holds
    /// nothing for it.
    RemoteDeleteSkipped { task_id: TaskId },
    Notify(Notice),
    /// A report was dropped by the duplicate or stale-phase guard.
    UpdateIgnored { task_id: TaskId, reason: IgnoreReason },
}

/// User-facing transition worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Completed { task_id: TaskId },
    Failed { task_id: TaskId, can_retry: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    DuplicateSuccess,
    StalePhase { current: TaskStatus, reported: TaskStatus },
}
