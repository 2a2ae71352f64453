use std::fmt;

use notes_core::{AudioMeta, FormData, TaskId, TaskStatus, Transcript};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Response wrapper used by every service endpoint. `code == 0` is success.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    #[serde(flatten)]
    pub form: &'a FormData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitData {
    pub task_id: TaskId,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DeleteRequest<'a> {
    pub video_id: &'a str,
    pub platform: &'a str,
}

/// Status of one job as seen by the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusReport {
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<NoteResult>,
    /// Failure description when the service reports the job itself failed.
    #[serde(skip)]
    pub message: Option<String>,
}

impl StatusReport {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: None,
            message: Some(message.into()),
        }
    }
}

/// Payload of a finished job.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct NoteResult {
    pub markdown: String,
    pub transcript: Transcript,
    pub audio_meta: AudioMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: FailureKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the failure happened on the way to the service rather than
    /// being an answer from it.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Timeout | FailureKind::Network | FailureKind::HttpStatus(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The service answered with a non-zero code.
    Rejected { code: i64 },
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Rejected { code } => write!(f, "rejected by service (code {code})"),
            FailureKind::Decode => write!(f, "malformed response"),
        }
    }
}
