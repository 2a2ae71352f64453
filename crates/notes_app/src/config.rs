//! Client configuration, read from a RON file.
//!
//! Every field is optional; anything left out falls back to the defaults
//! below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use notes_engine::{EngineSettings, PollSettings, ServiceSettings};
use notes_logging::{LevelFilter, LogDestination};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "notes.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub polling: PollingConfig,
    pub state_file: PathBuf,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub max_transport_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogDestination,
    pub level: String,
    pub file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            polling: PollingConfig::default(),
            state_file: PathBuf::from("task-storage.json"),
            log: LogConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let defaults = ServiceSettings::default();
        Self {
            base_url: defaults.base_url,
            connect_timeout_ms: millis(defaults.connect_timeout),
            request_timeout_ms: millis(defaults.request_timeout),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        let defaults = PollSettings::default();
        Self {
            interval_ms: millis(defaults.interval),
            max_transport_failures: defaults.max_transport_failures,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            level: "info".to_string(),
            file: PathBuf::from("notes.log"),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or `notes.ron` in the working directory when no path is
    /// given. Only the implicit file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = ron::from_str(content)?;
        config.log_level()?;
        if config.polling.interval_ms == 0 {
            bail!("polling.interval_ms must be greater than zero");
        }
        Ok(config)
    }

    pub fn log_level(&self) -> Result<LevelFilter> {
        self.log
            .level
            .parse()
            .with_context(|| format!("unknown log level {:?}", self.log.level))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            service: ServiceSettings {
                base_url: self.service.base_url.clone(),
                connect_timeout: Duration::from_millis(self.service.connect_timeout_ms),
                request_timeout: Duration::from_millis(self.service.request_timeout_ms),
            },
            poll: PollSettings {
                interval: Duration::from_millis(self.polling.interval_ms),
                max_transport_failures: self.polling.max_transport_failures,
            },
            state_file: self.state_file.clone(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AppConfig::parse("()").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn partial_config_overrides_only_given_fields() {
        let config = AppConfig::parse(
            r#"(
                service: (base_url: "http://notes.local:9000/api"),
                polling: (interval_ms: 500),
                log: (destination: both, level: "debug"),
            )"#,
        )
        .unwrap();

        let settings = config.engine_settings();
        assert_eq!(settings.service.base_url, "http://notes.local:9000/api");
        assert_eq!(settings.service.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.poll.interval, Duration::from_millis(500));
        assert_eq!(settings.poll.max_transport_failures, 3);
        assert_eq!(config.log.destination, LogDestination::Both);
        assert_eq!(config.log_level().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(AppConfig::parse(r#"(log: (level: "loud"))"#).is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        assert!(AppConfig::parse("(polling: (interval_ms: 0))").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(AppConfig::load(Some(&temp.path().join("missing.ron"))).is_err());
    }

    #[test]
    fn config_file_is_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.ron");
        fs::write(&path, r#"(state_file: "/tmp/tasks.json")"#).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.state_file, PathBuf::from("/tmp/tasks.json"));
    }
}
