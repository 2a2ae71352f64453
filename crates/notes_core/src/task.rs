use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the remote service at submission time.
pub type TaskId = String;

/// Phase of a generation job as reported by the service.
///
/// Only `Success` and `Failed` are terminal. Labels the service invents later
/// are kept verbatim in `Other` so they survive a save/load cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    Parsing,
    Downloading,
    Transcribing,
    Summarizing,
    Formatting,
    Saving,
    Success,
    Failed,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Parsing => "PARSING",
            TaskStatus::Downloading => "DOWNLOADING",
            TaskStatus::Transcribing => "TRANSCRIBING",
            TaskStatus::Summarizing => "SUMMARIZING",
            TaskStatus::Formatting => "FORMATTING",
            TaskStatus::Saving => "SAVING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Other(label) => label,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// Human readable description of the phase.
    pub fn description(&self) -> &str {
        match self {
            TaskStatus::Pending => "Queued",
            TaskStatus::Parsing => "Parsing link",
            TaskStatus::Downloading => "Downloading",
            TaskStatus::Transcribing => "Transcribing",
            TaskStatus::Summarizing => "Summarizing",
            TaskStatus::Formatting => "Formatting",
            TaskStatus::Saving => "Saving",
            TaskStatus::Success => "Done",
            TaskStatus::Failed => "Failed",
            TaskStatus::Other(_) => "Unknown phase",
        }
    }

    /// Position in the documented pipeline. Unknown labels have no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            TaskStatus::Pending => Some(0),
            TaskStatus::Parsing => Some(1),
            TaskStatus::Downloading => Some(2),
            TaskStatus::Transcribing => Some(3),
            TaskStatus::Summarizing => Some(4),
            TaskStatus::Formatting => Some(5),
            TaskStatus::Saving => Some(6),
            TaskStatus::Success | TaskStatus::Failed => Some(7),
            TaskStatus::Other(_) => None,
        }
    }

    /// Whether an update reporting `next` may be applied on top of `self`.
    ///
    /// Phases only move forward. A terminal task is only re-opened by a
    /// resubmission, never by an incoming report; a failed task may still
    /// receive a late success.
    pub fn can_advance_to(&self, next: &TaskStatus) -> bool {
        match self {
            TaskStatus::Success => false,
            TaskStatus::Failed => next.is_terminal(),
            _ => match (self.rank(), next.rank()) {
                (Some(current), Some(incoming)) => incoming >= current,
                _ => true,
            },
        }
    }
}

impl From<String> for TaskStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "PENDING" => TaskStatus::Pending,
            "PARSING" => TaskStatus::Parsing,
            "DOWNLOADING" => TaskStatus::Downloading,
            "TRANSCRIBING" => TaskStatus::Transcribing,
            "SUMMARIZING" => TaskStatus::Summarizing,
            "FORMATTING" => TaskStatus::Formatting,
            "SAVING" => TaskStatus::Saving,
            "SUCCESS" => TaskStatus::Success,
            // Older clients persisted the misspelled label.
            "FAILED" | "FAILD" => TaskStatus::Failed,
            _ => TaskStatus::Other(label),
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(label: &str) -> Self {
        TaskStatus::from(label.to_string())
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadQuality {
    #[default]
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteFormat {
    Toc,
    Link,
    Screenshot,
    Summary,
}

/// Submission parameters, kept so a task can be regenerated without asking again.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormData {
    pub video_url: String,
    pub platform: String,
    pub quality: DownloadQuality,
    pub model_name: String,
    pub provider_id: String,
    pub style: String,
    pub format: Vec<NoteFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<String>,
    pub video_understanding: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_interval: Option<u32>,
    pub grid_size: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMeta {
    pub title: String,
    pub cover_url: String,
    pub duration: f64,
    pub file_path: String,
    pub platform: String,
    pub video_id: String,
    pub raw_info: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Transcript {
    pub full_text: String,
    pub language: String,
    pub segments: Vec<Segment>,
    pub raw: serde_json::Value,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.full_text.is_empty() && self.segments.is_empty()
    }
}

/// One generated revision of a task's note.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownVersion {
    pub ver_id: String,
    pub content: String,
    pub style: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

/// A task's generated note.
///
/// Tasks saved before versioning existed hold a single string. Versioned
/// lists are newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Markdown {
    Legacy(String),
    Versioned(Vec<MarkdownVersion>),
}

/// Reads either shape. Unreadable entries of a version list are skipped so
/// the rest of the history survives.
impl<'de> Deserialize<'de> for Markdown {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(content) => Ok(Markdown::Legacy(content)),
            serde_json::Value::Array(entries) => Ok(Markdown::Versioned(
                entries
                    .into_iter()
                    .filter_map(|entry| MarkdownVersion::deserialize(entry).ok())
                    .collect(),
            )),
            other => Err(serde::de::Error::custom(format!(
                "expected a note string or a version list, got {other}"
            ))),
        }
    }
}

impl Default for Markdown {
    fn default() -> Self {
        Markdown::Legacy(String::new())
    }
}

impl Markdown {
    /// Content of the most recent generation, if any.
    pub fn latest(&self) -> Option<&str> {
        match self {
            Markdown::Legacy(content) if content.is_empty() => None,
            Markdown::Legacy(content) => Some(content),
            Markdown::Versioned(versions) => versions.first().map(|v| v.content.as_str()),
        }
    }

    pub fn versions(&self) -> &[MarkdownVersion] {
        match self {
            Markdown::Legacy(_) => &[],
            Markdown::Versioned(versions) => versions,
        }
    }

    pub fn version_count(&self) -> usize {
        match self {
            Markdown::Legacy(content) => usize::from(!content.is_empty()),
            Markdown::Versioned(versions) => versions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.version_count() == 0
    }
}

/// One user-submitted video-to-note job.
///
/// Every field tolerates malformed persisted input by falling back to its
/// empty value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "or_default")]
    pub id: TaskId,
    #[serde(default, deserialize_with = "or_default")]
    pub platform: String,
    #[serde(default, deserialize_with = "or_default")]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "or_default")]
    pub form_data: FormData,
    #[serde(default, deserialize_with = "or_default")]
    pub audio_meta: AudioMeta,
    #[serde(default, deserialize_with = "or_default")]
    pub transcript: Transcript,
    #[serde(default, deserialize_with = "or_default")]
    pub markdown: Markdown,
    #[serde(default, deserialize_with = "or_default")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn pending(
        id: impl Into<TaskId>,
        platform: impl Into<String>,
        form_data: FormData,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            platform: platform.into(),
            status: TaskStatus::Pending,
            form_data,
            audio_meta: AudioMeta::default(),
            transcript: Transcript::default(),
            markdown: Markdown::default(),
            created_at,
        }
    }

    /// Title to show in lists: the resolved media title, else the source URL.
    pub fn display_title(&self) -> &str {
        if self.audio_meta.title.is_empty() {
            &self.form_data.video_url
        } else {
            &self.audio_meta.title
        }
    }
}

/// Partial update merged into a task. `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub markdown: Option<Markdown>,
    pub transcript: Option<Transcript>,
    pub audio_meta: Option<AudioMeta>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// A completed generation: status, new note content and the resolved media.
    pub fn success(markdown: impl Into<String>, transcript: Transcript, audio_meta: AudioMeta) -> Self {
        Self {
            status: Some(TaskStatus::Success),
            markdown: Some(Markdown::Legacy(markdown.into())),
            transcript: Some(transcript),
            audio_meta: Some(audio_meta),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.markdown.is_none()
            && self.transcript.is_none()
            && self.audio_meta.is_none()
    }
}

pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}
