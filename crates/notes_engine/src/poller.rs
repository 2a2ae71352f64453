//! Recurring reconciliation of pending tasks against the job service.
//!
//! Every tick reads the pending set fresh from the repository and issues one
//! status query per task. Queries run as independent tasks: a slow one never
//! delays the others or the next tick, and a query still in flight when the
//! scheduler stops is still applied when it returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use notes_core::{Task, TaskId, TaskPatch, TaskStatus};
use notes_logging::{notes_debug, notes_error, notes_info, notes_warn};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::{NoteService, StatusReport, TaskRepository};

/// Shortest tick period; a zero interval from configuration is raised to this.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    /// Time between ticks. Values below 10 ms behave like 10 ms.
    pub interval: Duration,
    /// Consecutive transport failures tolerated before a task is marked
    /// `FAILED`. Values below 1 behave like 1.
    pub max_transport_failures: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            max_transport_failures: 3,
        }
    }
}

#[derive(Clone)]
pub struct PollScheduler {
    repository: TaskRepository,
    service: Arc<dyn NoteService>,
    settings: PollSettings,
    failures: Arc<Mutex<HashMap<TaskId, u32>>>,
}

/// Running scheduler loop. Dropping the handle does not stop the loop; call
/// [`PollHandle::stop`] or cancel its token.
pub struct PollHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollHandle {
    /// Stops issuing ticks and waits for the loop to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

impl PollScheduler {
    pub fn new(
        repository: TaskRepository,
        service: Arc<dyn NoteService>,
        settings: PollSettings,
    ) -> Self {
        Self {
            repository,
            service,
            settings,
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawns the tick loop on the current runtime.
    pub fn start(&self) -> PollHandle {
        let cancel = CancellationToken::new();
        let scheduler = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(token).await });
        PollHandle { cancel, handle }
    }

    async fn run(self, cancel: CancellationToken) {
        let period = self.settings.interval.max(MIN_INTERVAL);
        notes_info!("Polling every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first poll waits one interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.spawn_tick();
                }
            }
        }
        notes_info!("Polling stopped");
    }

    /// Issues one query per pending task without waiting for any of them.
    pub fn spawn_tick(&self) -> Vec<JoinHandle<()>> {
        let pending = self.repository.list_pending();
        self.forget_failures_except(&pending);
        if !pending.is_empty() {
            notes_debug!("Polling {} pending task(s)", pending.len());
        }
        pending
            .into_iter()
            .map(|task| {
                let scheduler = self.clone();
                tokio::spawn(async move { scheduler.poll_task(task).await })
            })
            .collect()
    }

    /// Runs a single tick and waits until all of its queries are applied.
    pub async fn poll_once(&self) {
        for joined in join_all(self.spawn_tick()).await {
            if let Err(err) = joined {
                notes_error!("Status query task aborted: {}", err);
            }
        }
    }

    async fn poll_task(&self, task: Task) {
        match self.service.query_status(&task.id).await {
            Ok(report) => {
                self.reset_failures(&task.id);
                if report.status == task.status {
                    return;
                }
                if let Some(message) = &report.message {
                    notes_warn!("Service reports task {} failed: {}", task.id, message);
                }
                self.apply(&task.id, patch_for(report));
            }
            Err(err) if err.is_transport() => {
                let failures = self.record_failure(&task.id);
                let limit = self.settings.max_transport_failures.max(1);
                notes_warn!(
                    "Status query for task {} failed ({}/{}): {}",
                    task.id,
                    failures,
                    limit,
                    err
                );
                if failures >= limit {
                    self.reset_failures(&task.id);
                    self.apply(&task.id, TaskPatch::status(TaskStatus::Failed));
                }
            }
            Err(err) => {
                notes_warn!("Status query for task {} was refused: {}", task.id, err);
                self.reset_failures(&task.id);
                self.apply(&task.id, TaskPatch::status(TaskStatus::Failed));
            }
        }
    }

    fn apply(&self, task_id: &str, patch: TaskPatch) {
        if let Err(err) = self.repository.apply_update(task_id, patch) {
            notes_error!("Could not record update for task {}: {}", task_id, err);
        }
    }

    fn record_failure(&self, task_id: &str) -> u32 {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = failures.entry(task_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drops failure streaks of tasks that finished or were removed.
    fn forget_failures_except(&self, pending: &[Task]) {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.retain(|task_id, _| pending.iter().any(|task| &task.id == task_id));
    }

    fn reset_failures(&self, task_id: &str) {
        let mut failures = match self.failures.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failures.remove(task_id);
    }
}

/// A `SUCCESS` report carries the whole result as one update; any other
/// report only moves the status.
fn patch_for(report: StatusReport) -> TaskPatch {
    match (report.status, report.result) {
        (TaskStatus::Success, Some(result)) => {
            TaskPatch::success(result.markdown, result.transcript, result.audio_meta)
        }
        (status, _) => TaskPatch::status(status),
    }
}
