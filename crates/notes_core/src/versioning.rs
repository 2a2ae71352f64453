//! Folds newly generated note content into a task's version history.
//!
//! History is newest first. A task still carrying a legacy single-string note
//! is upgraded on its first regeneration: the old string becomes the oldest
//! version and the new content is placed on top of it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Markdown, MarkdownVersion, Task};

/// Returns the task's history with `content` prepended as the newest version.
///
/// Style and model are captured from the task's form data as it is now, so
/// later resubmissions with other parameters do not rewrite older versions.
pub fn fold_content(task: &Task, content: String, at: DateTime<Utc>) -> Markdown {
    let newest = new_version(task, content, at);
    let mut history = Vec::with_capacity(task.markdown.version_count() + 1);
    history.push(newest);

    match &task.markdown {
        Markdown::Versioned(previous) => history.extend(previous.iter().cloned()),
        Markdown::Legacy(previous) if previous.is_empty() => {}
        Markdown::Legacy(previous) => {
            history.push(new_version(task, previous.clone(), task.created_at));
        }
    }

    Markdown::Versioned(history)
}

pub fn new_version(task: &Task, content: String, at: DateTime<Utc>) -> MarkdownVersion {
    MarkdownVersion {
        ver_id: new_version_id(&task.id),
        content,
        style: task.form_data.style.clone(),
        model_name: task.form_data.model_name.clone(),
        created_at: at,
    }
}

fn new_version_id(task_id: &str) -> String {
    format!("{task_id}-{}", Uuid::new_v4())
}
