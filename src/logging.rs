//! Logging
//!
//! `tracing` subscriber setup. The configured settings can be overridden from
//! the environment: `TWINSYNC_LOG` replaces the whole filter,
//! `TWINSYNC_LOG_MODULES` adds `module=level` pairs, and `TWINSYNC_LOG_FORMAT`
//! and `TWINSYNC_LOG_OUTPUT` take the same values as the configuration file.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const FILTER_ENV: &str = "TWINSYNC_LOG";
const MODULES_ENV: &str = "TWINSYNC_LOG_MODULES";
const FORMAT_ENV: &str = "TWINSYNC_LOG_FORMAT";
const OUTPUT_ENV: &str = "TWINSYNC_LOG_OUTPUT";

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {} (expected text or json)", other)),
        }
    }
}

/// Where log lines are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    /// stdout carries command output
    #[default]
    Stderr,
    File,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(format!(
                "unknown log output: {} (expected stdout, stderr or file)",
                other
            )),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level: trace, debug, info, warn, error, off
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Destination when `output` is `file`
    pub file: PathBuf,
    /// ANSI colors; never applied to file output
    pub color: bool,
    /// Per-module levels, e.g. `twinsync::sync = "trace"`
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file: default_log_file(),
            color: true,
            modules: BTreeMap::new(),
        }
    }
}

fn default_log_file() -> PathBuf {
    directories::ProjectDirs::from("", "", "twinsync")
        .map(|dirs| dirs.data_dir().join("twinsync.log"))
        .unwrap_or_else(|| PathBuf::from(".twinsync/twinsync.log"))
}

impl LoggingConfig {
    /// Check that the level and module directives form a valid filter
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.filter().map(|_| ())
    }

    fn directives(&self) -> String {
        std::iter::once(self.level.clone())
            .chain(
                self.modules
                    .iter()
                    .map(|(module, level)| format!("{}={}", module, level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }

    fn filter(&self) -> Result<EnvFilter, ConfigError> {
        let directives = self.directives();
        EnvFilter::try_new(&directives)
            .map_err(|e| ConfigError::Logging(format!("invalid log filter {:?}: {}", directives, e)))
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(format) = env_value(FORMAT_ENV)? {
            self.format = format;
        }
        if let Some(output) = env_value(OUTPUT_ENV)? {
            self.output = output;
        }
        if let Ok(modules) = std::env::var(MODULES_ENV) {
            self.modules.extend(parse_module_levels(&modules)?);
        }
        Ok(self)
    }

    fn writer(&self) -> Result<BoxMakeWriter, ConfigError> {
        match self.output {
            LogOutput::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
            LogOutput::Stderr => Ok(BoxMakeWriter::new(std::io::stderr)),
            LogOutput::File => {
                if let Some(parent) = self.file.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ConfigError::Logging(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.file)
                    .map_err(|e| {
                        ConfigError::Logging(format!("cannot open {}: {}", self.file.display(), e))
                    })?;
                Ok(BoxMakeWriter::new(Mutex::new(file)))
            }
        }
    }
}

fn env_value<T: FromStr<Err = String>>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::Logging(format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Parse `module=level` pairs separated by commas
fn parse_module_levels(value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((module, level)) if !module.trim().is_empty() && !level.trim().is_empty() => {
                Ok((module.trim().to_string(), level.trim().to_string()))
            }
            _ => Err(ConfigError::Logging(format!(
                "{}: expected module=level, got {:?}",
                MODULES_ENV, pair
            ))),
        })
        .collect()
}

/// Install the global subscriber
///
/// Environment variables win over `config`, which wins over defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ConfigError> {
    let config = config.cloned().unwrap_or_default().with_env_overrides()?;
    let filter = match EnvFilter::try_from_env(FILTER_ENV) {
        Ok(filter) => filter,
        Err(_) => config.filter()?,
    };
    let ansi = config.color && config.output != LogOutput::File;

    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(config.writer()?);
    let registry = Registry::default().with(filter);
    let result = match config.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Text => registry.with(layer.with_ansi(ansi)).try_init(),
    };
    result.map_err(|e| ConfigError::Logging(e.to_string()))
}
