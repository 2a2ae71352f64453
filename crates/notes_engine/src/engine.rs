use std::path::PathBuf;
use std::sync::Arc;

use notes_core::{FormData, TaskId};
use notes_logging::notes_warn;
use thiserror::Error;

use crate::{
    JsonFileStore, NoteService, PollHandle, PollScheduler, PollSettings, RepositoryError,
    ReqwestNoteService, RetryController, ServiceError, ServiceSettings, StateStore,
    TaskRepository,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub service: ServiceSettings,
    pub poll: PollSettings,
    pub state_file: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            poll: PollSettings::default(),
            state_file: PathBuf::from("task-storage.json"),
        }
    }
}

/// Wires the service, the store, the repository, the scheduler and retry.
#[derive(Clone)]
pub struct NoteEngine {
    repository: TaskRepository,
    service: Arc<dyn NoteService>,
    scheduler: PollScheduler,
    retry: RetryController,
}

impl NoteEngine {
    /// Engine talking HTTP to the configured service and saving to a JSON file.
    pub fn connect(settings: EngineSettings) -> Result<Self, EngineError> {
        let service = Arc::new(ReqwestNoteService::new(settings.service)?);
        let store = Arc::new(JsonFileStore::new(settings.state_file));
        Ok(Self::new(service, store, settings.poll))
    }

    pub fn new(
        service: Arc<dyn NoteService>,
        store: Arc<dyn StateStore>,
        poll: PollSettings,
    ) -> Self {
        let repository = TaskRepository::open(store, service.clone());
        let scheduler = PollScheduler::new(repository.clone(), service.clone(), poll);
        let retry = RetryController::new(repository.clone(), service.clone());
        Self {
            repository,
            service,
            scheduler,
            retry,
        }
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repository
    }

    /// Submits a new job. A rejected submission creates no task.
    pub async fn submit(&self, form: FormData) -> Result<TaskId, EngineError> {
        let task_id = self.service.submit(&form, None).await?;
        self.repository
            .create_pending(task_id.clone(), form.platform.clone(), form)?;
        Ok(task_id)
    }

    pub async fn retry(
        &self,
        task_id: &str,
        override_form: Option<FormData>,
    ) -> Result<bool, EngineError> {
        self.retry.retry(task_id, override_form).await
    }

    /// Removes the task and waits until the service was asked to release its
    /// files. The request's outcome is logged, never returned.
    pub async fn remove(&self, task_id: &str) -> Result<(), EngineError> {
        if let Some(delete) = self.repository.remove(task_id)? {
            if let Err(err) = delete.await {
                notes_warn!("Remote delete for task {} did not finish: {}", task_id, err);
            }
        }
        Ok(())
    }

    pub fn select(&self, task_id: Option<TaskId>) -> Result<(), EngineError> {
        Ok(self.repository.set_current(task_id)?)
    }

    pub fn start_polling(&self) -> PollHandle {
        self.scheduler.start()
    }
}
