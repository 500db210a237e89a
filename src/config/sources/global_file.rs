//! Global config file source: $XDG_CONFIG_HOME/skyhive/config.toml

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};

/// Add the global config file to the builder when one exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match xdg::global_config_file() {
        Ok(path) => Ok(builder.add_source(File::from(path).required(false))),
        // No HOME: nothing global to read
        Err(_) => Ok(builder),
    }
}
