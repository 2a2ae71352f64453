mod commands;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use notes_engine::NoteEngine;
use notes_logging::notes_info;

use crate::commands::Command;
use crate::config::AppConfig;

/// Turn online videos into notes through a note-generation service.
#[derive(Debug, Parser)]
#[command(name = "notes", version)]
struct Cli {
    /// RON configuration file. Defaults to `notes.ron` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the service base URL, e.g. `http://127.0.0.1:8483/api`.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.service.base_url = base_url;
    }

    notes_logging::initialize(config.log.destination, config.log_level()?, &config.log.file);
    notes_info!("Starting notes client against {}", config.service.base_url);

    let engine = NoteEngine::connect(config.engine_settings())?;
    commands::run(&engine, cli.command).await
}
