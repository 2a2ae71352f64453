use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notes_core::TaskSnapshot;
use notes_logging::notes_warn;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode task state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable home of the task book.
pub trait StateStore: Send + Sync {
    /// Loads the persisted book. Absent or unreadable state yields an empty
    /// snapshot rather than an error.
    fn load(&self) -> TaskSnapshot;

    fn save(&self, snapshot: &TaskSnapshot) -> Result<(), PersistError>;
}

/// Ensure the state directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Keeps the book as pretty-printed JSON in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn split_path(&self) -> Result<(PathBuf, String), PersistError> {
        let filename = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PersistError::OutputDir(format!("{:?} has no file name", self.path)))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok((dir, filename.to_string()))
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> TaskSnapshot {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return TaskSnapshot::default();
            }
            Err(err) => {
                notes_warn!("Failed to read task state from {:?}: {}", self.path, err);
                return TaskSnapshot::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                notes_warn!("Failed to parse task state from {:?}: {}", self.path, err);
                TaskSnapshot::default()
            }
        }
    }

    fn save(&self, snapshot: &TaskSnapshot) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(snapshot)?;
        let (dir, filename) = self.split_path()?;
        AtomicFileWriter::new(dir).write(&filename, &content)?;
        Ok(())
    }
}

/// Store that lives only as long as the process. Saves still go through
/// JSON so what comes back matches what a file store would return.
#[derive(Default)]
pub struct MemoryStore {
    content: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: &TaskSnapshot) -> Result<Self, PersistError> {
        let store = Self::new();
        store.save(snapshot)?;
        Ok(store)
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> TaskSnapshot {
        let guard = match self.content.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .as_deref()
            .and_then(|text| serde_json::from_str(text).ok())
            .unwrap_or_default()
    }

    fn save(&self, snapshot: &TaskSnapshot) -> Result<(), PersistError> {
        let content = serde_json::to_string(snapshot)?;
        let mut guard = match self.content.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(content);
        Ok(())
    }
}
