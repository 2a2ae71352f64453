use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use notes_core::{DownloadQuality, FormData, NoteFormat, TaskId, TaskStatus};
use notes_engine::NoteEngine;
use notes_logging::notes_info;
use url::Url;

use crate::render;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a video for note generation.
    Submit(SubmitArgs),
    /// List all tasks, newest first.
    List,
    /// Show a task's details and note. Defaults to the selected task.
    Show {
        task_id: Option<TaskId>,
        /// Note version to print, 1 = newest.
        #[arg(long)]
        version: Option<usize>,
        /// Print the transcript instead of the note.
        #[arg(long)]
        transcript: bool,
    },
    /// Select the task `show` uses by default.
    Select {
        #[arg(required_unless_present = "none")]
        task_id: Option<TaskId>,
        /// Clear the selection.
        #[arg(long, conflicts_with = "task_id")]
        none: bool,
    },
    /// Regenerate a task's note, optionally with different settings.
    Retry {
        task_id: TaskId,
        #[command(flatten)]
        overrides: Overrides,
        /// Keep polling until the task finishes.
        #[arg(long)]
        watch: bool,
    },
    /// Delete a task locally and release its files on the service.
    Remove { task_id: TaskId },
    /// Poll pending tasks until they finish or Ctrl-C is pressed.
    Watch,
}

#[derive(Debug, Args)]
pub struct SubmitArgs {
    pub video_url: String,
    /// Source platform; inferred from the URL when omitted.
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long, value_enum, default_value_t = QualityArg::Fast)]
    pub quality: QualityArg,
    #[arg(long = "model", default_value = "")]
    pub model_name: String,
    #[arg(long = "provider", default_value = "")]
    pub provider_id: String,
    #[arg(long, default_value = "")]
    pub style: String,
    /// Extra sections to include; may be repeated.
    #[arg(long = "format", value_enum)]
    pub formats: Vec<FormatArg>,
    /// Free-form instructions passed to the model.
    #[arg(long)]
    pub extras: Option<String>,
    #[arg(long)]
    pub video_understanding: bool,
    /// Seconds between sampled frames.
    #[arg(long)]
    pub video_interval: Option<u32>,
    /// Screenshot grid as COLUMNS ROWS.
    #[arg(long, num_args = 2, value_names = ["COLUMNS", "ROWS"])]
    pub grid_size: Vec<u32>,
    /// Keep polling until the task finishes.
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct Overrides {
    #[arg(long = "model")]
    pub model_name: Option<String>,
    #[arg(long = "provider")]
    pub provider_id: Option<String>,
    #[arg(long)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityArg {
    Fast,
    Medium,
    Slow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Toc,
    Link,
    Screenshot,
    Summary,
}

impl From<QualityArg> for DownloadQuality {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Fast => DownloadQuality::Fast,
            QualityArg::Medium => DownloadQuality::Medium,
            QualityArg::Slow => DownloadQuality::Slow,
        }
    }
}

impl From<FormatArg> for NoteFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Toc => NoteFormat::Toc,
            FormatArg::Link => NoteFormat::Link,
            FormatArg::Screenshot => NoteFormat::Screenshot,
            FormatArg::Summary => NoteFormat::Summary,
        }
    }
}

impl SubmitArgs {
    fn into_form(self) -> Result<FormData> {
        let platform = match self.platform {
            Some(platform) => platform,
            None => detect_platform(&self.video_url)?,
        };
        Ok(FormData {
            video_url: self.video_url,
            platform,
            quality: self.quality.into(),
            model_name: self.model_name,
            provider_id: self.provider_id,
            style: self.style,
            format: self.formats.into_iter().map(NoteFormat::from).collect(),
            extras: self.extras,
            video_understanding: self.video_understanding,
            video_interval: self.video_interval,
            grid_size: self.grid_size,
        })
    }
}

impl Overrides {
    fn is_empty(&self) -> bool {
        self.model_name.is_none() && self.provider_id.is_none() && self.style.is_none()
    }

    fn apply_to(self, mut form: FormData) -> FormData {
        if let Some(model_name) = self.model_name {
            form.model_name = model_name;
        }
        if let Some(provider_id) = self.provider_id {
            form.provider_id = provider_id;
        }
        if let Some(style) = self.style {
            form.style = style;
        }
        form
    }
}

pub async fn run(engine: &NoteEngine, command: Command) -> Result<()> {
    match command {
        Command::Submit(args) => {
            let watch_after = args.watch;
            let form = args.into_form()?;
            notes_info!("Submitting {} ({})", form.video_url, form.platform);
            let task_id = engine.submit(form).await?;
            println!("Submitted task {task_id}");
            if watch_after {
                watch(engine).await?;
            }
        }
        Command::List => print!("{}", render::render_list(&engine.repository().view())),
        Command::Show {
            task_id,
            version,
            transcript,
        } => {
            let task = match task_id {
                Some(task_id) => engine
                    .repository()
                    .get(&task_id)
                    .ok_or_else(|| anyhow!("no task {task_id}"))?,
                None => engine
                    .repository()
                    .current()
                    .context("no task selected; pass a task id")?,
            };
            if transcript {
                if task.transcript.is_empty() {
                    bail!("task {} has no transcript yet", task.id);
                }
                print!("{}", render::render_transcript(&task.transcript));
            } else {
                print!("{}", render::render_task(&task, version)?);
            }
        }
        Command::Select { task_id, none } => {
            let task_id = if none { None } else { task_id };
            if let Some(id) = &task_id {
                if engine.repository().get(id).is_none() {
                    bail!("no task {id}");
                }
            }
            engine.select(task_id)?;
        }
        Command::Retry {
            task_id,
            overrides,
            watch: watch_after,
        } => {
            let override_form = if overrides.is_empty() {
                None
            } else {
                let task = engine
                    .repository()
                    .get(&task_id)
                    .ok_or_else(|| anyhow!("no task {task_id}"))?;
                Some(overrides.apply_to(task.form_data))
            };
            if !engine.retry(&task_id, override_form).await? {
                bail!("no task {task_id}");
            }
            println!("Resubmitted task {task_id}");
            if watch_after {
                watch(engine).await?;
            }
        }
        Command::Remove { task_id } => {
            if engine.repository().get(&task_id).is_none() {
                bail!("no task {task_id}");
            }
            engine.remove(&task_id).await?;
            println!("Removed task {task_id}");
        }
        Command::Watch => watch(engine).await?,
    }
    Ok(())
}

/// Polls until no task is pending, printing every status change.
async fn watch(engine: &NoteEngine) -> Result<()> {
    let repository = engine.repository();
    let mut views = repository.subscribe();
    let mut last: HashMap<TaskId, TaskStatus> = views
        .borrow_and_update()
        .rows
        .iter()
        .map(|row| (row.task_id.clone(), row.status.clone()))
        .collect();
    if repository.list_pending().is_empty() {
        println!("No pending tasks.");
        return Ok(());
    }

    let handle = engine.start_polling();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                println!("Interrupted.");
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                for row in &view.rows {
                    if last.get(&row.task_id) != Some(&row.status) {
                        println!("{}", render::status_change(row));
                        last.insert(row.task_id.clone(), row.status.clone());
                    }
                }
                if view.pending_count == 0 {
                    break;
                }
            }
        }
    }

    handle.stop().await;
    Ok(())
}

/// Maps well-known video hosts to the platform name the service expects.
pub fn detect_platform(video_url: &str) -> Result<String> {
    let url = Url::parse(video_url).with_context(|| format!("invalid video url {video_url:?}"))?;
    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("video url {video_url:?} has no host"))?
        .to_ascii_lowercase();
    let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    let platform = if matches("bilibili.com") || matches("b23.tv") {
        "bilibili"
    } else if matches("youtube.com") || matches("youtu.be") {
        "youtube"
    } else if matches("douyin.com") {
        "douyin"
    } else if matches("kuaishou.com") {
        "kuaishou"
    } else {
        bail!("cannot tell the platform of {video_url:?}; pass --platform");
    };
    Ok(platform.to_string())
}
