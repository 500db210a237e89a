//! Merge policy: later sources override earlier ones key by key, on top of the
//! serialized defaults, so a partial file only replaces what it names.

use crate::config::SkyhiveConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with `SkyhiveConfig::default()` as the lowest layer.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&SkyhiveConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}
