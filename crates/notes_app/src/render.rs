//! Plain-text rendering of the task book for the terminal.

use std::fmt::Write;

use anyhow::{bail, Result};
use notes_core::{Task, TaskListView, TaskRowView, TaskStatus, Transcript};

pub fn render_list(view: &TaskListView) -> String {
    if view.rows.is_empty() {
        return "No tasks.\n".to_string();
    }
    let current = view.current.as_ref().map(|detail| detail.task_id.as_str());

    let mut out = String::new();
    for row in &view.rows {
        let marker = if current == Some(row.task_id.as_str()) {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(out, "{marker} {}", format_task_row(row));
    }
    let _ = writeln!(
        out,
        "{} task(s), {} pending",
        view.rows.len(),
        view.pending_count
    );
    out
}

pub fn format_task_row(row: &TaskRowView) -> String {
    let versions = match row.version_count {
        0 => String::new(),
        1 => ", 1 version".to_string(),
        n => format!(", {n} versions"),
    };
    format!(
        "[{id}] {status} {title} ({platform}{versions}, {created})",
        id = row.task_id,
        status = status_label(&row.status),
        title = row.title,
        platform = row.platform,
        created = row.created_at.format("%Y-%m-%d %H:%M"),
    )
}

pub fn status_label(status: &TaskStatus) -> &str {
    match status {
        TaskStatus::Success => "OK",
        TaskStatus::Failed => "ERR",
        other => other.as_str(),
    }
}

/// Full description of one task followed by the chosen note version,
/// counted from 1 = newest.
pub fn render_task(task: &Task, version: Option<usize>) -> Result<String> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", task.display_title());
    let _ = writeln!(out, "  id:       {}", task.id);
    let _ = writeln!(
        out,
        "  status:   {} ({})",
        task.status,
        task.status.description()
    );
    let _ = writeln!(out, "  platform: {}", task.platform);
    let _ = writeln!(out, "  url:      {}", task.form_data.video_url);
    if !task.form_data.model_name.is_empty() {
        let _ = writeln!(out, "  model:    {}", task.form_data.model_name);
    }
    if !task.form_data.style.is_empty() {
        let _ = writeln!(out, "  style:    {}", task.form_data.style);
    }
    if task.audio_meta.duration > 0.0 {
        let _ = writeln!(
            out,
            "  duration: {}",
            format_duration(task.audio_meta.duration)
        );
    }
    let _ = writeln!(
        out,
        "  created:  {}",
        task.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    let versions = task.markdown.versions();
    if !versions.is_empty() {
        let _ = writeln!(out, "  versions:");
        for (index, version) in versions.iter().enumerate() {
            let _ = writeln!(
                out,
                "    {}. {} {} {}",
                index + 1,
                version.created_at.format("%Y-%m-%d %H:%M"),
                or_dash(&version.model_name),
                or_dash(&version.style)
            );
        }
    }

    let content = match version {
        None => task.markdown.latest(),
        Some(0) => bail!("versions are numbered from 1"),
        Some(n) if versions.is_empty() && n == 1 => task.markdown.latest(),
        Some(n) => match versions.get(n - 1) {
            Some(version) => Some(version.content.as_str()),
            None => bail!(
                "task {} has {} version(s), not {}",
                task.id,
                task.markdown.version_count(),
                n
            ),
        },
    };
    if let Some(content) = content.filter(|text| !text.is_empty()) {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", content.trim_end());
    }
    Ok(out)
}

pub fn render_transcript(transcript: &Transcript) -> String {
    if transcript.segments.is_empty() {
        return format!("{}\n", transcript.full_text.trim_end());
    }
    let mut out = String::new();
    for segment in &transcript.segments {
        let _ = writeln!(
            out,
            "[{} - {}] {}",
            format_duration(segment.start),
            format_duration(segment.end),
            segment.text.trim()
        );
    }
    out
}

/// One line for a task whose status just changed.
pub fn status_change(row: &TaskRowView) -> String {
    let mut line = format!(
        "[{}] {}: {}",
        row.task_id,
        row.status,
        row.status.description()
    );
    if row.can_retry {
        let _ = write!(line, " (retry with `notes retry {}`)", row.task_id);
    }
    line
}

pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}
