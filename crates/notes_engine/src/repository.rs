use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use notes_core::{
    update, Effect, FormData, IgnoreReason, Msg, Notice, Task, TaskBook, TaskId, TaskListView,
    TaskPatch,
};
use notes_logging::{notes_debug, notes_error, notes_info, notes_warn};
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::{NoteService, PersistError, StateStore};

const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("task state was changed but not saved: {0}")]
    Persist(#[from] PersistError),
}

/// Shared handle to the task book.
///
/// Every mutation runs through the core reducer under one lock and is written
/// to the store before the call returns. Clones share the same book.
#[derive(Clone)]
pub struct TaskRepository {
    inner: Arc<Inner>,
}

struct Inner {
    book: Mutex<TaskBook>,
    store: Arc<dyn StateStore>,
    service: Arc<dyn NoteService>,
    views: watch::Sender<TaskListView>,
    notices: broadcast::Sender<Notice>,
}

impl TaskRepository {
    /// Loads the book from `store`. `service` receives deletion requests.
    pub fn open(store: Arc<dyn StateStore>, service: Arc<dyn NoteService>) -> Self {
        let book = TaskBook::from_snapshot(store.load());
        notes_info!(
            "Loaded {} task(s), {} pending",
            book.tasks().len(),
            book.list_pending().len()
        );
        let (views, _) = watch::channel(book.view());
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                book: Mutex::new(book),
                store,
                service,
                views,
                notices,
            }),
        }
    }

    /// Inserts a pending task and selects it. An empty id is ignored.
    pub fn create_pending(
        &self,
        task_id: impl Into<TaskId>,
        platform: impl Into<String>,
        form_data: FormData,
    ) -> Result<(), RepositoryError> {
        let task_id = task_id.into();
        if task_id.is_empty() {
            notes_warn!("Ignoring pending task without an id");
            return Ok(());
        }
        notes_info!("Tracking new task {}", task_id);
        self.dispatch(Msg::TaskSubmitted {
            task_id,
            platform: platform.into(),
            form_data,
            at: Utc::now(),
        })
    }

    pub fn apply_update(&self, task_id: &str, patch: TaskPatch) -> Result<(), RepositoryError> {
        self.dispatch(Msg::StatusReported {
            task_id: task_id.to_string(),
            patch,
            at: Utc::now(),
        })
    }

    /// Deletes the task locally and asks the service to release its files.
    ///
    /// The remote request runs in the background and its failure is only
    /// logged. The returned handle lets a short-lived caller wait for it.
    pub fn remove(&self, task_id: &str) -> Result<Option<JoinHandle<()>>, RepositoryError> {
        let mut spawned = self.dispatch_spawning(Msg::TaskRemoved(task_id.to_string()))?;
        Ok(spawned.pop())
    }

    pub fn set_current(&self, task_id: Option<TaskId>) -> Result<(), RepositoryError> {
        self.dispatch(Msg::TaskSelected(task_id))
    }

    pub fn mark_resubmitted(&self, task_id: &str, form_data: FormData) -> Result<(), RepositoryError> {
        self.dispatch(Msg::TaskResubmitted {
            task_id: task_id.to_string(),
            form_data,
        })
    }

    /// Drops every task locally. Nothing is deleted on the service.
    pub fn clear(&self) -> Result<(), RepositoryError> {
        self.dispatch(Msg::TasksCleared)
    }

    pub fn current(&self) -> Option<Task> {
        self.lock().current().cloned()
    }

    pub fn get(&self, task_id: &str) -> Option<Task> {
        self.lock().get(task_id).cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks().to_vec()
    }

    /// Tasks that have not reached `SUCCESS` or `FAILED`, read fresh on every call.
    pub fn list_pending(&self) -> Vec<Task> {
        self.lock().list_pending().into_iter().cloned().collect()
    }

    pub fn view(&self) -> TaskListView {
        self.lock().view()
    }

    /// Receiver that always holds the view of the latest saved state.
    pub fn subscribe(&self) -> watch::Receiver<TaskListView> {
        self.inner.views.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, TaskBook> {
        match self.inner.book.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn dispatch(&self, msg: Msg) -> Result<(), RepositoryError> {
        self.dispatch_spawning(msg).map(|_| ())
    }

    /// Like `dispatch`, also handing back the background work the effects
    /// started.
    fn dispatch_spawning(&self, msg: Msg) -> Result<Vec<JoinHandle<()>>, RepositoryError> {
        let (effects, saved) = {
            let mut guard = self.lock();
            let book = std::mem::take(&mut *guard);
            let (mut book, effects) = update(book, msg);
            let saved = if book.consume_dirty() {
                let saved = self.inner.store.save(&book.snapshot());
                self.inner.views.send_replace(book.view());
                saved
            } else {
                Ok(())
            };
            *guard = book;
            (effects, saved)
        };

        let spawned = effects
            .into_iter()
            .filter_map(|effect| self.run_effect(effect))
            .collect();

        match saved {
            Ok(()) => Ok(spawned),
            Err(err) => {
                notes_error!("Failed to save task state: {}", err);
                Err(RepositoryError::from(err))
            }
        }
    }

    fn run_effect(&self, effect: Effect) -> Option<JoinHandle<()>> {
        match effect {
            Effect::DeleteRemoteJob {
                task_id,
                video_id,
                platform,
            } => return self.spawn_remote_delete(task_id, video_id, platform),
            Effect::RemoteDeleteSkipped { task_id } => {
                notes_info!(
                    "Task {} has no resolved video; nothing to delete remotely",
                    task_id
                );
            }
            Effect::Notify(notice) => {
                notes_info!("Task notice: {:?}", notice);
                let _ = self.inner.notices.send(notice);
            }
            Effect::UpdateIgnored { task_id, reason } => match reason {
                IgnoreReason::DuplicateSuccess => {
                    notes_debug!("Ignoring repeated SUCCESS for task {}", task_id);
                }
                IgnoreReason::StalePhase { current, reported } => {
                    notes_debug!(
                        "Ignoring stale phase {} for task {} (currently {})",
                        reported,
                        task_id,
                        current
                    );
                }
            },
        }
        None
    }

    fn spawn_remote_delete(
        &self,
        task_id: TaskId,
        video_id: String,
        platform: String,
    ) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            notes_warn!(
                "No async runtime; skipping remote delete for task {} ({} on {})",
                task_id,
                video_id,
                platform
            );
            return None;
        };
        let service = self.inner.service.clone();
        Some(runtime.spawn(async move {
            match service.delete_job(&video_id, &platform).await {
                Ok(()) => notes_info!("Released remote files for task {}", task_id),
                Err(err) => notes_warn!("Remote delete for task {} failed: {}", task_id, err),
            }
        }))
    }
}
