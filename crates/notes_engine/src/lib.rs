//! Notes engine: job service client, durable task storage, polling and retry.
mod engine;
mod persist;
mod poller;
mod repository;
mod retry;
mod service;
mod types;

pub use engine::{EngineError, EngineSettings, NoteEngine};
pub use persist::{
    ensure_output_dir, AtomicFileWriter, JsonFileStore, MemoryStore, PersistError, StateStore,
};
pub use poller::{PollHandle, PollScheduler, PollSettings};
pub use repository::{RepositoryError, TaskRepository};
pub use retry::RetryController;
pub use service::{NoteService, ReqwestNoteService, ServiceSettings};
pub use types::{FailureKind, NoteResult, ServiceError, StatusReport};
