//! Explicit config file source passed on the command line

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::File;
use std::path::Path;

/// Add a required config file to the builder.
///
/// Unlike the global file, a file named explicitly must exist.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>, path: &Path) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path.to_path_buf()).required(true))
}
