//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::SkyhiveConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the global file, the workspace file and environment.
    pub fn load(workspace_root: &Path) -> Result<SkyhiveConfig, ConfigError> {
        MergeService::load(workspace_root)
    }

    /// Load configuration from a specific file, with the environment still on top.
    pub fn load_from_file(path: &Path) -> Result<SkyhiveConfig, ConfigError> {
        MergeService::load_from_file(path)
    }

    /// Create default configuration.
    pub fn default() -> SkyhiveConfig {
        SkyhiveConfig::default()
    }
}
