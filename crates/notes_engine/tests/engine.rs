mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_polling, form, init_logging, success, ScriptedService};
use notes_core::{AudioMeta, TaskPatch, TaskStatus, Transcript};
use notes_engine::{FailureKind, MemoryStore, NoteEngine, ServiceError, StateStore};

fn engine_with(service: Arc<ScriptedService>) -> (NoteEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = NoteEngine::new(service, store.clone(), fast_polling(3));
    (engine, store)
}

#[tokio::test]
async fn submit_tracks_task_returned_by_service() {
    init_logging();
    let service = ScriptedService::new();
    service.next_submit(Ok("abc".to_string()));
    let (engine, store) = engine_with(service.clone());

    let task_id = engine.submit(form("https://b23.tv/1")).await.unwrap();

    assert_eq!(task_id, "abc");
    let current = engine.repository().current().unwrap();
    assert_eq!(current.id, "abc");
    assert_eq!(current.platform, "bilibili");
    assert_eq!(current.status, TaskStatus::Pending);
    assert_eq!(store.load().tasks.len(), 1);
    assert_eq!(service.submits.lock().unwrap()[0].1, None);
}

#[tokio::test]
async fn rejected_submission_creates_no_task() {
    init_logging();
    let service = ScriptedService::new();
    service.next_submit(Err(ServiceError::new(
        FailureKind::Rejected { code: 1 },
        "note already generated",
    )));
    let (engine, _store) = engine_with(service);

    let err = engine.submit(form("https://b23.tv/1")).await.unwrap_err();

    assert!(err.to_string().contains("note already generated"));
    assert!(engine.repository().tasks().is_empty());
    assert!(engine.repository().current().is_none());
}

#[tokio::test]
async fn submitted_task_completes_through_polling() {
    init_logging();
    let service = ScriptedService::new();
    service.next_submit(Ok("abc".to_string()));
    service.script("abc", Ok(success("# Note")));
    let (engine, _store) = engine_with(service);
    let mut views = engine.repository().subscribe();

    engine.submit(form("https://b23.tv/1")).await.unwrap();
    let handle = engine.start_polling();

    let view = views
        .wait_for(|view| view.pending_count == 0 && !view.rows.is_empty())
        .await
        .unwrap()
        .clone();
    handle.stop().await;

    let current = view.current.expect("selected task");
    assert_eq!(current.status, TaskStatus::Success);
    assert_eq!(current.markdown.as_deref(), Some("# Note"));
}

#[tokio::test]
async fn select_and_remove_through_engine() {
    init_logging();
    let service = ScriptedService::new();
    service.next_submit(Ok("a".to_string()));
    service.next_submit(Ok("b".to_string()));
    let (engine, _store) = engine_with(service);
    engine.submit(form("https://b23.tv/1")).await.unwrap();
    engine.submit(form("https://b23.tv/2")).await.unwrap();

    engine.select(Some("a".to_string())).unwrap();
    engine.remove("a").await.unwrap();

    assert!(engine.repository().current().is_none());
    assert_eq!(engine.repository().tasks().len(), 1);
}

#[tokio::test]
async fn engine_remove_waits_for_slow_remote_delete() {
    init_logging();
    let service = ScriptedService::new();
    service.next_submit(Ok("a".to_string()));
    service.slow_deletes(Duration::from_millis(300));
    let (engine, _store) = engine_with(service.clone());
    engine.submit(form("https://b23.tv/1")).await.unwrap();
    engine
        .repository()
        .apply_update(
            "a",
            TaskPatch::success(
                "# Note",
                Transcript::default(),
                AudioMeta {
                    video_id: "BV1".to_string(),
                    ..AudioMeta::default()
                },
            ),
        )
        .unwrap();

    engine.remove("a").await.unwrap();

    assert_eq!(
        service.deletes.lock().unwrap().as_slice(),
        &[("BV1".to_string(), "bilibili".to_string())]
    );
    assert!(engine.repository().tasks().is_empty());
}
