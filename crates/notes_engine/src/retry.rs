use std::sync::Arc;

use notes_core::FormData;
use notes_logging::{notes_info, notes_warn};

use crate::{EngineError, NoteService, TaskRepository};

/// Regenerates existing tasks under their original id.
#[derive(Clone)]
pub struct RetryController {
    repository: TaskRepository,
    service: Arc<dyn NoteService>,
}

impl RetryController {
    pub fn new(repository: TaskRepository, service: Arc<dyn NoteService>) -> Self {
        Self {
            repository,
            service,
        }
    }

    /// Resubmits `task_id` with `override_form`, or with the parameters it was
    /// last submitted with.
    ///
    /// Returns `Ok(false)` when the task is unknown. On success the task is
    /// back to `PENDING` with its earlier notes, transcript and media kept.
    /// A rejected submission leaves the task untouched.
    pub async fn retry(
        &self,
        task_id: &str,
        override_form: Option<FormData>,
    ) -> Result<bool, EngineError> {
        let Some(task) = self.repository.get(task_id) else {
            return Ok(false);
        };
        let form = override_form.unwrap_or(task.form_data);

        let accepted_id = self.service.submit(&form, Some(task_id)).await?;
        if accepted_id != task_id {
            notes_warn!(
                "Service answered retry of {} with id {}; keeping the original id",
                task_id,
                accepted_id
            );
        }

        notes_info!("Resubmitted task {}", task_id);
        self.repository.mark_resubmitted(task_id, form)?;
        Ok(true)
    }
}
