#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use notes_core::{FormData, TaskId, TaskStatus};
use notes_engine::{
    FailureKind, MemoryStore, NoteResult, NoteService, PollSettings, ServiceError, StatusReport,
    TaskRepository,
};
use tokio::sync::Notify;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(notes_logging::initialize_for_tests);
}

pub fn report(status: TaskStatus) -> StatusReport {
    StatusReport {
        status,
        result: None,
        message: None,
    }
}

pub fn success(markdown: &str) -> StatusReport {
    StatusReport {
        status: TaskStatus::Success,
        result: Some(NoteResult {
            markdown: markdown.to_string(),
            ..NoteResult::default()
        }),
        message: None,
    }
}

pub fn network_error() -> ServiceError {
    ServiceError::new(FailureKind::Network, "connection refused")
}

pub fn form(url: &str) -> FormData {
    FormData {
        video_url: url.to_string(),
        platform: "bilibili".to_string(),
        model_name: "gpt-4o".to_string(),
        style: "minimal".to_string(),
        ..FormData::default()
    }
}

/// Job service double: answers from per-task scripts and records calls.
/// A task without script left reports `PENDING`.
#[derive(Default)]
pub struct ScriptedService {
    statuses: Mutex<HashMap<TaskId, VecDeque<Result<StatusReport, ServiceError>>>>,
    gates: Mutex<HashMap<TaskId, Arc<Notify>>>,
    submit_results: Mutex<VecDeque<Result<TaskId, ServiceError>>>,
    delete_error: Mutex<Option<ServiceError>>,
    delete_delay: Mutex<Option<Duration>>,
    pub queries: Mutex<Vec<TaskId>>,
    pub submits: Mutex<Vec<(FormData, Option<String>)>>,
    pub deletes: Mutex<Vec<(String, String)>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, task_id: &str, answer: Result<StatusReport, ServiceError>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .push_back(answer);
    }

    /// Holds queries for `task_id` until the returned gate is notified.
    pub fn gate(&self, task_id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(task_id.to_string(), gate.clone());
        gate
    }

    pub fn next_submit(&self, answer: Result<TaskId, ServiceError>) {
        self.submit_results.lock().unwrap().push_back(answer);
    }

    pub fn fail_deletes(&self, error: ServiceError) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    /// Makes every delete take `delay` before it is recorded.
    pub fn slow_deletes(&self, delay: Duration) {
        *self.delete_delay.lock().unwrap() = Some(delay);
    }

    pub fn query_count(&self, task_id: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == task_id)
            .count()
    }
}

#[async_trait::async_trait]
impl NoteService for ScriptedService {
    async fn submit(&self, form: &FormData, task_id: Option<&str>) -> Result<TaskId, ServiceError> {
        self.submits
            .lock()
            .unwrap()
            .push((form.clone(), task_id.map(ToOwned::to_owned)));
        let scripted = self.submit_results.lock().unwrap().pop_front();
        match scripted {
            Some(answer) => answer,
            None => Ok(task_id.unwrap_or("generated").to_string()),
        }
    }

    async fn query_status(&self, task_id: &str) -> Result<StatusReport, ServiceError> {
        self.queries.lock().unwrap().push(task_id.to_string());
        let gate = self.gates.lock().unwrap().get(task_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(report(TaskStatus::Pending)))
    }

    async fn delete_job(&self, video_id: &str, platform: &str) -> Result<(), ServiceError> {
        let delay = *self.delete_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.deletes
            .lock()
            .unwrap()
            .push((video_id.to_string(), platform.to_string()));
        match self.delete_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn repository_with(service: Arc<ScriptedService>) -> (TaskRepository, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let repository = TaskRepository::open(store.clone(), service);
    (repository, store)
}

pub fn fast_polling(max_transport_failures: u32) -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(20),
        max_transport_failures,
    }
}

/// Waits up to one second for `condition` to hold.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
