//! Configuration
//!
//! Layered loading via the `config` crate: built-in defaults, then the global
//! `$XDG_CONFIG_HOME/skyhive/config.toml`, then `<workspace>/config.toml`, then
//! `SKYHIVE__SECTION__KEY` environment variables.

pub mod facade;
pub mod merge {
    pub mod merge_policy;
    pub mod service;
}
pub mod paths {
    pub mod xdg_root;
}
pub mod sources {
    pub mod environment;
    pub mod global_file;
    pub mod workspace_file;
}
pub mod workspace {
    pub mod storage_paths;
}

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::{StagingConfig, StoreConfig};

use crate::browser::chromium::LaunchOptions;
use crate::browser::ScrollPolicy;
use crate::error::ApiError;
use crate::extract::{DomSelectors, ExtractSettings, Strategy};
use crate::logging::LoggingConfig;
use crate::store::INDEX_SUFFIX;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkyhiveConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SkyhiveConfig {
    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.store.collection.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "store.collection must not be empty".to_string(),
            ));
        }
        if self.store.collection.ends_with(INDEX_SUFFIX) {
            return Err(ApiError::ConfigError(format!(
                "store.collection '{}' must not end with '{}'",
                self.store.collection, INDEX_SUFFIX
            )));
        }
        if self.pipeline.concurrency == 0 {
            return Err(ApiError::ConfigError(
                "pipeline.concurrency must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.browser.base_url).map_err(|e| {
            ApiError::ConfigError(format!(
                "browser.base_url '{}' is not a valid URL: {}",
                self.browser.base_url, e
            ))
        })?;
        if self.resolver.enabled {
            url::Url::parse(&self.resolver.base_url).map_err(|e| {
                ApiError::ConfigError(format!(
                    "resolver.base_url '{}' is not a valid URL: {}",
                    self.resolver.base_url, e
                ))
            })?;
        }
        Ok(())
    }

    pub fn extract_settings(&self) -> ExtractSettings {
        let delay = Duration::from_millis(self.pipeline.scroll_delay_ms);
        ExtractSettings {
            base_url: self.browser.base_url.clone(),
            settle: Duration::from_millis(self.pipeline.settle_ms),
            discovery_scroll: ScrollPolicy::new(delay, self.pipeline.discovery_max_scrolls),
            post_scroll: ScrollPolicy::new(delay, self.pipeline.post_max_scrolls),
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            headless: self.browser.headless,
            executable: self.browser.executable.clone(),
            navigation_timeout: Duration::from_secs(self.browser.navigation_timeout_secs),
        }
    }
}

/// Browser session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run Chrome without a window (default: false)
    #[serde(default)]
    pub headless: bool,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Where cookies are saved at the end of a run, relative to the workspace
    #[serde(default = "default_session_file")]
    pub session_file: Option<PathBuf>,

    /// Chrome binary; auto-detected when unset
    #[serde(default)]
    pub executable: Option<PathBuf>,

    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://bsky.app".to_string()
}

fn default_session_file() -> Option<PathBuf> {
    Some(PathBuf::from("session.json"))
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            base_url: default_base_url(),
            session_file: default_session_file(),
            executable: None,
            navigation_timeout_secs: default_navigation_timeout_secs(),
        }
    }
}

/// Batch sizes, concurrency and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_profile_limit")]
    pub profile_limit: usize,

    #[serde(default = "default_post_limit")]
    pub post_limit: usize,

    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,

    #[serde(default = "default_discovery_max_scrolls")]
    pub discovery_max_scrolls: usize,

    #[serde(default = "default_post_max_scrolls")]
    pub post_max_scrolls: usize,

    /// Read when no seed is passed on the command line
    #[serde(default = "default_seed_file")]
    pub seed_file: PathBuf,
}

fn default_concurrency() -> usize {
    4
}

fn default_profile_limit() -> usize {
    10
}

fn default_post_limit() -> usize {
    5
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_scroll_delay_ms() -> u64 {
    1000
}

fn default_discovery_max_scrolls() -> usize {
    10
}

fn default_post_max_scrolls() -> usize {
    5
}

fn default_seed_file() -> PathBuf {
    PathBuf::from("seed_users.txt")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            profile_limit: default_profile_limit(),
            post_limit: default_post_limit(),
            settle_ms: default_settle_ms(),
            scroll_delay_ms: default_scroll_delay_ms(),
            discovery_max_scrolls: default_discovery_max_scrolls(),
            post_max_scrolls: default_post_max_scrolls(),
            seed_file: default_seed_file(),
        }
    }
}

/// Extraction strategy per stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub follows: Strategy,

    #[serde(default)]
    pub profile: Strategy,

    #[serde(default)]
    pub posts: Strategy,

    #[serde(default)]
    pub selectors: DomSelectors,
}

/// Handle resolution over XRPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_resolver_url")]
    pub base_url: String,
}

fn default_true() -> bool {
    true
}

fn default_resolver_url() -> String {
    "https://public.api.bsky.app".to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_resolver_url(),
        }
    }
}
