mod common;

use std::time::Duration;

use common::{
    eventually, fast_polling, form, init_logging, network_error, report, repository_with,
    success, ScriptedService,
};
use notes_core::TaskStatus;
use notes_engine::{FailureKind, PollScheduler, PollSettings, ServiceError, StatusReport};

#[tokio::test]
async fn phase_then_success_creates_one_version() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), PollSettings::default());
    repository
        .create_pending("abc", "bilibili", form("https://www.bilibili.com/video/BV1"))
        .unwrap();

    service.script("abc", Ok(report(TaskStatus::Transcribing)));
    scheduler.poll_once().await;
    let task = repository.get("abc").unwrap();
    assert_eq!(task.status, TaskStatus::Transcribing);
    assert!(task.markdown.is_empty());

    service.script("abc", Ok(success("# Note")));
    scheduler.poll_once().await;
    let task = repository.get("abc").unwrap();
    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.markdown.versions().len(), 1);
    assert_eq!(task.markdown.versions()[0].content, "# Note");

    // Terminal tasks leave the working set.
    scheduler.poll_once().await;
    assert_eq!(service.query_count("abc"), 2);
}

#[tokio::test]
async fn unchanged_phase_is_not_reapplied() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), PollSettings::default());
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();
    let mut views = repository.subscribe();
    views.borrow_and_update();

    scheduler.poll_once().await;

    assert_eq!(service.query_count("abc"), 1);
    assert!(!views.has_changed().unwrap());
}

#[tokio::test]
async fn transport_failures_fail_task_after_limit() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();

    for _ in 0..2 {
        service.script("abc", Err(network_error()));
        scheduler.poll_once().await;
        assert_eq!(repository.get("abc").unwrap().status, TaskStatus::Pending);
    }
    service.script("abc", Err(network_error()));
    scheduler.poll_once().await;

    assert_eq!(repository.get("abc").unwrap().status, TaskStatus::Failed);
    assert!(repository.view().rows[0].can_retry);
}

#[tokio::test]
async fn successful_query_resets_failure_count() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(2));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();

    service.script("abc", Err(network_error()));
    service.script("abc", Ok(report(TaskStatus::Downloading)));
    service.script("abc", Err(network_error()));
    for _ in 0..3 {
        scheduler.poll_once().await;
    }

    assert_eq!(repository.get("abc").unwrap().status, TaskStatus::Downloading);
}

#[tokio::test]
async fn single_failure_limit_fails_immediately() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(0));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();

    service.script(
        "abc",
        Err(ServiceError::new(FailureKind::Timeout, "timed out")),
    );
    scheduler.poll_once().await;

    assert_eq!(repository.get("abc").unwrap().status, TaskStatus::Failed);
}

#[tokio::test]
async fn service_reported_failure_is_applied_at_once() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();

    service.script("abc", Ok(StatusReport::failed("video unavailable")));
    scheduler.poll_once().await;

    let task = repository.get("abc").unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.markdown.is_empty());
}

#[tokio::test]
async fn malformed_answer_fails_without_waiting() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();

    service.script("abc", Err(ServiceError::new(FailureKind::Decode, "bad json")));
    scheduler.poll_once().await;

    assert_eq!(repository.get("abc").unwrap().status, TaskStatus::Failed);
}

#[tokio::test]
async fn slow_query_does_not_block_other_tasks() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), PollSettings::default());
    repository
        .create_pending("slow", "bilibili", form("https://b23.tv/1"))
        .unwrap();
    repository
        .create_pending("fast", "bilibili", form("https://b23.tv/2"))
        .unwrap();
    let gate = service.gate("slow");
    service.script("slow", Ok(success("# Slow")));
    service.script("fast", Ok(success("# Fast")));

    let handles = scheduler.spawn_tick();
    assert_eq!(handles.len(), 2);

    assert!(eventually(|| repository.get("fast").unwrap().status == TaskStatus::Success).await);
    assert_eq!(repository.get("slow").unwrap().status, TaskStatus::Pending);

    gate.notify_one();
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(repository.get("slow").unwrap().status, TaskStatus::Success);
}

#[tokio::test]
async fn running_loop_picks_up_tasks_added_later() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    let handle = scheduler.start();

    tokio::time::sleep(Duration::from_millis(50)).await;
    service.script("late", Ok(report(TaskStatus::Summarizing)));
    repository
        .create_pending("late", "youtube", form("https://youtu.be/x"))
        .unwrap();

    assert!(
        eventually(|| repository.get("late").unwrap().status == TaskStatus::Summarizing).await
    );
    handle.stop().await;
}

#[tokio::test]
async fn stopped_loop_issues_no_more_queries() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();

    let handle = scheduler.start();
    assert!(eventually(|| service.query_count("abc") >= 2).await);
    handle.stop().await;
    // Queries spawned by the last tick may still be starting.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let after_stop = service.query_count("abc");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.query_count("abc"), after_stop);
}

#[tokio::test]
async fn in_flight_query_lands_after_stop() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();
    let gate = service.gate("abc");
    service.script("abc", Ok(success("# Late")));

    let handle = scheduler.start();
    assert!(eventually(|| service.query_count("abc") >= 1).await);
    handle.stop().await;
    gate.notify_one();

    assert!(eventually(|| repository.get("abc").unwrap().status == TaskStatus::Success).await);
    assert_eq!(repository.get("abc").unwrap().markdown.latest(), Some("# Late"));
}

#[tokio::test]
async fn zero_interval_still_polls() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(
        repository.clone(),
        service.clone(),
        PollSettings {
            interval: Duration::ZERO,
            max_transport_failures: 3,
        },
    );
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();
    service.script("abc", Ok(success("# Note")));

    let handle = scheduler.start();
    assert!(
        eventually(|| repository.get("abc").unwrap().status == TaskStatus::Success).await,
        "scheduler never polled"
    );
    handle.stop().await;
}

#[tokio::test]
async fn failure_streak_of_removed_task_is_forgotten() {
    init_logging();
    let service = ScriptedService::new();
    let (repository, _store) = repository_with(service.clone());
    let scheduler = PollScheduler::new(repository.clone(), service.clone(), fast_polling(3));
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();
    for _ in 0..2 {
        service.script("abc", Err(network_error()));
        scheduler.poll_once().await;
    }

    repository.remove("abc").unwrap();
    scheduler.poll_once().await;
    repository
        .create_pending("abc", "bilibili", form("https://b23.tv/1"))
        .unwrap();
    service.script("abc", Err(network_error()));
    scheduler.poll_once().await;

    assert_eq!(repository.get("abc").unwrap().status, TaskStatus::Pending);
}
