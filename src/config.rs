//! Configuration System
//!
//! Layered configuration loaded with the `config` crate. Sources, lowest
//! precedence first: built-in defaults, the global config file, an explicit
//! file, then `TWINSYNC__` environment variables (for example
//! `TWINSYNC__SYNC__POLL_INTERVAL_MS=500`).

use crate::error::{ConfigError, ScanError};
use crate::ignore::IgnoreMatcher;
use crate::logging::LoggingConfig;
use crate::tree::hasher::HashAlgorithm;
use crate::tree::symlink::SymlinkMode;
use crate::tree::walker::ScanOptions;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TwinsyncConfig {
    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synchronization behavior shared by all sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Gitignore-style patterns, evaluated in order
    #[serde(default)]
    pub ignores: Vec<String>,

    /// Ignore version control metadata directories
    #[serde(default = "default_true")]
    pub ignore_vcs: bool,

    #[serde(default)]
    pub symlink_mode: SymlinkMode,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Delay between automatic cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Recompose scanned names to Unicode NFC
    #[serde(default = "default_recompose_unicode")]
    pub recompose_unicode: bool,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

fn default_recompose_unicode() -> bool {
    cfg!(target_os = "macos")
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ignores: Vec::new(),
            ignore_vcs: default_true(),
            symlink_mode: SymlinkMode::default(),
            hash_algorithm: HashAlgorithm::default(),
            poll_interval_ms: default_poll_interval_ms(),
            recompose_unicode: default_recompose_unicode(),
        }
    }
}

impl SyncSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Compile the scan options these settings describe
    pub fn scan_options(&self) -> Result<ScanOptions, ScanError> {
        Ok(ScanOptions {
            ignores: IgnoreMatcher::new(&self.ignores, self.ignore_vcs)?,
            symlink_mode: self.symlink_mode,
            recompose_unicode: self.recompose_unicode,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "sync.poll_interval_ms must be positive".to_string(),
            ));
        }
        self.scan_options()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

/// Storage paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the session state database
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

fn default_state_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "twinsync")
        .map(|dirs| dirs.data_dir().join("state"))
        .unwrap_or_else(|| PathBuf::from(".twinsync/state"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl TwinsyncConfig {
    /// Load from the default locations plus an optional explicit file
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = explicit {
            loader = loader.with_file(path);
        }
        loader.load()
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()?;
        if self.storage.state_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.state_dir cannot be empty".to_string(),
            ));
        }
        self.logging.validate()?;
        Ok(())
    }
}

/// Builder over the configuration sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    global: Option<PathBuf>,
    explicit: Option<PathBuf>,
    environment: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader using the global file and the environment
    pub fn new() -> Self {
        Self {
            global: global_config_path(),
            explicit: None,
            environment: true,
        }
    }

    /// Loader with no sources beyond the defaults
    pub fn isolated() -> Self {
        Self {
            global: None,
            explicit: None,
            environment: false,
        }
    }

    pub fn with_global_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.global = Some(path.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    pub fn with_environment(mut self, enabled: bool) -> Self {
        self.environment = enabled;
        self
    }

    /// Merge all sources and validate the result
    pub fn load(&self) -> Result<TwinsyncConfig, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&TwinsyncConfig::default())?);
        builder = sources::global_file::add_to_builder(builder, self.global.as_deref());
        if let Some(path) = &self.explicit {
            builder = sources::explicit_file::add_to_builder(builder, path);
        }
        if self.environment {
            builder = builder.add_source(
                Environment::with_prefix("TWINSYNC")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sync.ignores"),
            );
        }

        let config: TwinsyncConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
