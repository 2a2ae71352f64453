use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::task::or_default;
use crate::view_model::{TaskDetailView, TaskListView, TaskRowView, VersionView};
use crate::{versioning, FormData, Markdown, Task, TaskId, TaskPatch, TaskStatus};

/// Result of merging a reported update into the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { previous: TaskStatus },
    /// `SUCCESS` reported again for a task that already succeeded.
    DuplicateSuccess,
    /// Reported phase is behind the task's current phase.
    Stale { current: TaskStatus, reported: TaskStatus },
    MissingTask,
}

/// Durable form of the book: the task list and the selection pointer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskSnapshot {
    #[serde(default, deserialize_with = "tasks_or_skip")]
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "or_default")]
    pub current_task_id: Option<TaskId>,
}

/// In-memory collection of tasks plus the current selection.
///
/// Tasks are kept newest first. Operations on unknown ids are no-ops.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskBook {
    tasks: Vec<Task>,
    current: Option<TaskId>,
    dirty: bool,
}

impl TaskBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a book from persisted state. Entries without an id and
    /// repeated ids are dropped.
    pub fn from_snapshot(snapshot: TaskSnapshot) -> Self {
        let mut book = Self::new();
        book.restore(snapshot);
        book.dirty = false;
        book
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            tasks: self.tasks.clone(),
            current_task_id: self.current.clone(),
        }
    }

    pub(crate) fn restore(&mut self, snapshot: TaskSnapshot) {
        let mut tasks: Vec<Task> = Vec::with_capacity(snapshot.tasks.len());
        for task in snapshot.tasks {
            if task.id.is_empty() || tasks.iter().any(|t| t.id == task.id) {
                continue;
            }
            tasks.push(task);
        }
        self.tasks = tasks;
        self.current = snapshot.current_task_id;
        self.dirty = true;
    }

    /// Inserts a new pending task and selects it.
    ///
    /// Returns `false` when the id is empty or already known; a known id is
    /// still selected.
    pub fn create_pending(
        &mut self,
        task_id: TaskId,
        platform: String,
        form_data: FormData,
        at: DateTime<Utc>,
    ) -> bool {
        if task_id.is_empty() {
            return false;
        }
        if self.get(&task_id).is_some() {
            self.set_current(Some(task_id));
            return false;
        }
        self.tasks
            .insert(0, Task::pending(task_id.clone(), platform, form_data, at));
        self.current = Some(task_id);
        self.dirty = true;
        true
    }

    /// Merges `patch` into the task. A plain-string note is folded into the
    /// version history instead of replacing it.
    pub fn apply_update(&mut self, task_id: &str, patch: TaskPatch, at: DateTime<Utc>) -> ApplyOutcome {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            return ApplyOutcome::MissingTask;
        };

        if let Some(reported) = &patch.status {
            if task.status == TaskStatus::Success && *reported == TaskStatus::Success {
                return ApplyOutcome::DuplicateSuccess;
            }
            if !task.status.can_advance_to(reported) {
                return ApplyOutcome::Stale {
                    current: task.status.clone(),
                    reported: reported.clone(),
                };
            }
        }

        let previous = task.status.clone();
        if let Some(status) = patch.status {
            task.status = status;
        }
        match patch.markdown {
            Some(Markdown::Legacy(content)) if !content.is_empty() => {
                let folded = versioning::fold_content(task, content, at);
                task.markdown = folded;
            }
            Some(Markdown::Legacy(_)) | None => {}
            Some(versioned @ Markdown::Versioned(_)) => task.markdown = versioned,
        }
        if let Some(transcript) = patch.transcript {
            task.transcript = transcript;
        }
        if let Some(audio_meta) = patch.audio_meta {
            task.audio_meta = audio_meta;
        }

        self.dirty = true;
        ApplyOutcome::Applied { previous }
    }

    /// Re-opens a task after its resubmission was accepted: new parameters,
    /// status back to `PENDING`, existing results left in place.
    pub fn mark_resubmitted(&mut self, task_id: &str, form_data: FormData) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            return false;
        };
        task.form_data = form_data;
        task.status = TaskStatus::Pending;
        self.dirty = true;
        true
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == task_id)?;
        let removed = self.tasks.remove(index);
        if self.current.as_deref() == Some(task_id) {
            self.current = None;
        }
        self.dirty = true;
        Some(removed)
    }

    pub fn clear(&mut self) {
        if self.tasks.is_empty() && self.current.is_none() {
            return;
        }
        self.tasks.clear();
        self.current = None;
        self.dirty = true;
    }

    /// Moves the selection pointer. The id is not validated.
    pub fn set_current(&mut self, task_id: Option<TaskId>) {
        if self.current != task_id {
            self.current = task_id;
            self.dirty = true;
        }
    }

    pub fn current(&self) -> Option<&Task> {
        let id = self.current.as_deref()?;
        self.get(id)
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Tasks still waiting on the service.
    pub fn list_pending(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| !t.status.is_terminal())
            .collect()
    }

    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        was_dirty
    }

    pub fn view(&self) -> TaskListView {
        let rows = self
            .tasks
            .iter()
            .map(|task| TaskRowView {
                task_id: task.id.clone(),
                title: task.display_title().to_string(),
                platform: task.platform.clone(),
                status: task.status.clone(),
                can_retry: task.status == TaskStatus::Failed,
                version_count: task.markdown.version_count(),
                created_at: task.created_at,
            })
            .collect();

        TaskListView {
            rows,
            current: self.current().map(detail_view),
            pending_count: self.list_pending().len(),
            dirty: self.dirty,
        }
    }
}

fn detail_view(task: &Task) -> TaskDetailView {
    TaskDetailView {
        task_id: task.id.clone(),
        title: task.display_title().to_string(),
        status: task.status.clone(),
        can_retry: task.status == TaskStatus::Failed,
        markdown: task.markdown.latest().map(ToOwned::to_owned),
        versions: task
            .markdown
            .versions()
            .iter()
            .map(|v| VersionView {
                ver_id: v.ver_id.clone(),
                style: v.style.clone(),
                model_name: v.model_name.clone(),
                created_at: v.created_at,
            })
            .collect(),
        segment_count: task.transcript.segments.len(),
    }
}

fn tasks_or_skip<'de, D>(deserializer: D) -> Result<Vec<Task>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = or_default(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|value| Task::deserialize(value).ok())
        .collect())
}
