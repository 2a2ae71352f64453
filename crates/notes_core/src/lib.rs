//! Notes core: task model, pure state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod task;
mod update;
pub mod versioning;
mod view_model;

pub use effect::{Effect, IgnoreReason, Notice};
pub use msg::Msg;
pub use state::{ApplyOutcome, TaskBook, TaskSnapshot};
pub use task::{
    AudioMeta, DownloadQuality, FormData, Markdown, MarkdownVersion, NoteFormat, Segment, Task,
    TaskId, TaskPatch, TaskStatus, Transcript,
};
pub use update::update;
pub use view_model::{TaskDetailView, TaskListView, TaskRowView, VersionView};
