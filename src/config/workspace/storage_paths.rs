//! Store and staging configuration, and their resolution against the workspace.

use crate::config::xdg;
use crate::error::ApiError;
use crate::store::DEFAULT_COLLECTION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("data/staging")
}

/// Status store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// sled database directory; relative paths are taken from the workspace root.
    /// Unset means the XDG data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Collection (tree) holding the status records
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl StoreConfig {
    pub fn resolve_path(&self, workspace_root: &Path) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(workspace_root.join(path)),
            _ => xdg::default_store_dir(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            collection: default_collection(),
        }
    }
}

/// Staging area configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Root of the `follows/`, `profiles/` and `posts/` directories
    #[serde(default = "default_staging_root")]
    pub root: PathBuf,
}

impl StagingConfig {
    pub fn resolve_root(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.root)
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            root: default_staging_root(),
        }
    }
}
