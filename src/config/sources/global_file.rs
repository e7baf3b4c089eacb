//! Global config file source: $XDG_CONFIG_HOME/twinsync/config.toml or ~/.config/twinsync/config.toml

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(std::env::var_os("HOME")?).join(".config"),
    };
    Some(base.join("twinsync").join("config.toml"))
}

/// Add the global config file source to the builder if it exists.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>, path: Option<&Path>) -> ConfigBuilder<DefaultState> {
    match path {
        Some(path) if path.exists() => {
            debug!(config_path = %path.display(), "Loading global configuration");
            let canonical = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            builder.add_source(File::from(canonical).required(false))
        }
        Some(path) => {
            debug!(config_path = %path.display(), "No global configuration file");
            builder
        }
        None => builder,
    }
}
