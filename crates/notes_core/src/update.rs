use crate::{ApplyOutcome, Effect, IgnoreReason, Msg, Notice, TaskBook, TaskStatus};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TaskBook, msg: Msg) -> (TaskBook, Vec<Effect>) {
    let effects = match msg {
        Msg::TaskSubmitted {
            task_id,
            platform,
            form_data,
            at,
        } => {
            state.create_pending(task_id, platform, form_data, at);
            Vec::new()
        }
        Msg::StatusReported { task_id, patch, at } => {
            let reported = patch.status.clone();
            match state.apply_update(&task_id, patch, at) {
                ApplyOutcome::Applied { previous } => {
                    transition_notice(&task_id, &previous, reported.as_ref())
                        .map(Effect::Notify)
                        .into_iter()
                        .collect()
                }
                ApplyOutcome::DuplicateSuccess => vec![Effect::UpdateIgnored {
                    task_id,
                    reason: IgnoreReason::DuplicateSuccess,
                }],
                ApplyOutcome::Stale { current, reported } => vec![Effect::UpdateIgnored {
                    task_id,
                    reason: IgnoreReason::StalePhase { current, reported },
                }],
                ApplyOutcome::MissingTask => Vec::new(),
            }
        }
        Msg::TaskResubmitted { task_id, form_data } => {
            state.mark_resubmitted(&task_id, form_data);
            Vec::new()
        }
        Msg::TaskSelected(task_id) => {
            state.set_current(task_id);
            Vec::new()
        }
        Msg::TaskRemoved(task_id) => match state.remove(&task_id) {
            Some(task) if !task.audio_meta.video_id.is_empty() => {
                vec![Effect::DeleteRemoteJob {
                    task_id: task.id,
                    video_id: task.audio_meta.video_id,
                    platform: task.platform,
                }]
            }
            Some(task) => vec![Effect::RemoteDeleteSkipped { task_id: task.id }],
            None => Vec::new(),
        },
        Msg::TasksCleared => {
            state.clear();
            Vec::new()
        }
        Msg::TasksRestored(snapshot) => {
            state.restore(snapshot);
            Vec::new()
        }
    };

    (state, effects)
}

fn transition_notice(
    task_id: &str,
    previous: &TaskStatus,
    reported: Option<&TaskStatus>,
) -> Option<Notice> {
    let reported = reported?;
    if reported == previous {
        return None;
    }
    match reported {
        TaskStatus::Success => Some(Notice::Completed {
            task_id: task_id.to_string(),
        }),
        TaskStatus::Failed => Some(Notice::Failed {
            task_id: task_id.to_string(),
            can_retry: true,
        }),
        _ => None,
    }
}
