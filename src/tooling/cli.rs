//! CLI Tooling
//!
//! Command-line interface for the crawl pipeline. Every command is scoped to a
//! workspace, which holds the staging area, the session file and an optional
//! `config.toml`.

use crate::browser::BrowserSession;
use crate::config::{ConfigLoader, SkyhiveConfig};
use crate::error::ApiError;
use crate::extract::Extractors;
use crate::logging::LoggingConfig;
use crate::pipeline::{seed_from_file, Pipeline, StageReport};
use crate::resolver::{IdentityResolver, XrpcResolver};
use crate::session::SessionManager;
use crate::staging::StagingArea;
use crate::store::{SledStatusStore, StatusStore};
use crate::tooling::format::{format_stage_reports_text, format_status_text};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Skyhive CLI - Bluesky follow-graph crawler
#[derive(Parser, Debug)]
#[command(name = "skyhive")]
#[command(about = "Discover Bluesky users and collect their profiles and posts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level unless --log-level is given)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply logging flags on top of the configured logging section.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        } else if self.verbose {
            config.level = "debug".to_string();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Discover users from a seed account's following list
    #[command(alias = "spider")]
    Discover {
        /// Seed handle or DID (default: first line of the seed file)
        #[arg(long = "seed-user", short = 's')]
        seed_user: Option<String>,
    },
    /// Collect profiles of queued users
    CollectProfiles {
        /// Number of users to process
        #[arg(long, short = 'l')]
        limit: Option<usize>,
        /// Users processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Collect posts of users whose profile is collected
    CollectPosts {
        /// Number of users to process
        #[arg(long, short = 'l')]
        limit: Option<usize>,
        /// Users processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Run discovery, profile collection and post collection in one session
    RunPipeline {
        /// Seed handle or DID (default: first line of the seed file)
        #[arg(long = "seed-user", short = 's')]
        seed_user: Option<String>,
        /// Number of profiles to collect
        #[arg(long)]
        profile_limit: Option<usize>,
        /// Number of users to collect posts for
        #[arg(long)]
        post_limit: Option<usize>,
        /// Users processed at once
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Show user counts per status
    Status {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

impl Commands {
    pub fn needs_browser(&self) -> bool {
        !matches!(self, Commands::Status { .. })
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Discover { .. } => "discover",
        Commands::CollectProfiles { .. } => "collect-profiles",
        Commands::CollectPosts { .. } => "collect-posts",
        Commands::RunPipeline { .. } => "run-pipeline",
        Commands::Status { .. } => "status",
    }
}

/// Load configuration for a workspace, or from an explicit file.
pub fn load_config(
    workspace_root: &Path,
    config_path: Option<&Path>,
) -> Result<SkyhiveConfig, ApiError> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load(workspace_root)?,
    };
    config.validate()?;
    Ok(config)
}

/// CLI context for managing workspace state
pub struct CliContext {
    config: SkyhiveConfig,
    workspace_root: PathBuf,
    store: Arc<SledStatusStore>,
    store_path: PathBuf,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = load_config(&workspace_root, config_path.as_deref())?;
        Self::with_config(workspace_root, config)
    }

    /// Create a context from an already loaded configuration.
    pub fn with_config(workspace_root: PathBuf, config: SkyhiveConfig) -> Result<Self, ApiError> {
        let store_path = config.store.resolve_path(&workspace_root)?;
        let store = SledStatusStore::open(&store_path, &config.store.collection)?;
        Ok(Self {
            config,
            workspace_root,
            store: Arc::new(store),
            store_path,
        })
    }

    pub fn config(&self) -> &SkyhiveConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn StatusStore {
        self.store.as_ref()
    }

    pub fn staging(&self) -> StagingArea {
        StagingArea::new(self.config.staging.resolve_root(&self.workspace_root))
    }

    /// Execute a CLI command, launching Chrome for the crawl commands.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        if !command.needs_browser() {
            return self.execute_offline(command);
        }
        let session_file = self
            .config
            .browser
            .session_file
            .as_ref()
            .map(|file| self.workspace_root.join(file));
        let session = SessionManager::launch(&self.config.launch_options(), session_file).await?;
        self.execute_with_session(command, session).await
    }

    /// Execute a crawl command in `session`, which is closed before returning.
    pub async fn execute_with_session(
        &self,
        command: &Commands,
        session: SessionManager,
    ) -> Result<String, ApiError> {
        let started = Instant::now();
        info!(command = command_name(command), "Command started");

        let result = self.run_crawl(command, session.session()).await;
        if let Err(e) = session.close().await {
            warn!(error = %e, "Browser session did not shut down cleanly");
        }
        self.store.flush()?;

        match &result {
            Ok(_) => info!(
                command = command_name(command),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            ),
            Err(e) => warn!(command = command_name(command), error = %e, "Command failed"),
        }
        result
    }

    fn execute_offline(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Status { format } => self.status(format),
            _ => Err(ApiError::InvalidArgument(format!(
                "{} needs a browser session",
                command_name(command)
            ))),
        }
    }

    async fn run_crawl(
        &self,
        command: &Commands,
        session: &dyn BrowserSession,
    ) -> Result<String, ApiError> {
        let reports: Vec<StageReport> = match command {
            Commands::Discover { seed_user } => {
                let seed = self.seed(seed_user.as_deref())?;
                let pipeline = self.pipeline(None)?;
                vec![pipeline.discover(session, &seed).await?]
            }
            Commands::CollectProfiles { limit, concurrency } => {
                let pipeline = self.pipeline(*concurrency)?;
                let limit = limit.unwrap_or(self.config.pipeline.profile_limit);
                vec![pipeline.collect_profiles(session, limit).await?]
            }
            Commands::CollectPosts { limit, concurrency } => {
                let pipeline = self.pipeline(*concurrency)?;
                let limit = limit.unwrap_or(self.config.pipeline.post_limit);
                vec![pipeline.collect_posts(session, limit).await?]
            }
            Commands::RunPipeline {
                seed_user,
                profile_limit,
                post_limit,
                concurrency,
            } => {
                let seed = self.seed(seed_user.as_deref())?;
                let pipeline = self.pipeline(*concurrency)?;
                let report = pipeline
                    .run(
                        session,
                        &seed,
                        profile_limit.unwrap_or(self.config.pipeline.profile_limit),
                        post_limit.unwrap_or(self.config.pipeline.post_limit),
                    )
                    .await?;
                report.stages().into_iter().cloned().collect()
            }
            Commands::Status { format } => return self.status(format),
        };
        Ok(format_stage_reports_text(&reports.iter().collect::<Vec<_>>()))
    }

    /// Seed from the command line, else from the configured seed file.
    fn seed(&self, seed_user: Option<&str>) -> Result<String, ApiError> {
        match seed_user.map(str::trim).filter(|s| !s.is_empty()) {
            Some(seed) => Ok(seed.to_string()),
            None => {
                let seed_file = self.workspace_root.join(&self.config.pipeline.seed_file);
                let seed = seed_from_file(&seed_file)?;
                info!(seed = %seed, file = %seed_file.display(), "Using seed from seed file");
                Ok(seed)
            }
        }
    }

    fn pipeline(&self, concurrency: Option<usize>) -> Result<Pipeline, ApiError> {
        let concurrency = concurrency.unwrap_or(self.config.pipeline.concurrency);
        if concurrency == 0 {
            return Err(ApiError::InvalidArgument(
                "--concurrency must be at least 1".to_string(),
            ));
        }

        let resolver: Option<Arc<dyn IdentityResolver>> = if self.config.resolver.enabled {
            let resolver = XrpcResolver::new(&self.config.resolver.base_url)?;
            Some(Arc::new(resolver) as Arc<dyn IdentityResolver>)
        } else {
            None
        };
        let extraction = &self.config.extraction;
        let extractors = Extractors::select(
            extraction.follows,
            extraction.profile,
            extraction.posts,
            self.config.extract_settings(),
            extraction.selectors.clone(),
            resolver.clone(),
        );

        let store: Arc<dyn StatusStore> = self.store.clone();
        let mut pipeline =
            Pipeline::new(store, self.staging(), extractors).with_concurrency(concurrency);
        if let Some(resolver) = resolver {
            pipeline = pipeline.with_resolver(resolver);
        }
        Ok(pipeline)
    }

    fn status(&self, format: &str) -> Result<String, ApiError> {
        let counts = self.store.count_by_status()?;
        let store_path = self.store_path.display().to_string();
        match format {
            "json" => {
                let total: usize = counts.values().sum();
                let value = json!({
                    "store_path": store_path,
                    "collection": self.config.store.collection,
                    "counts": counts,
                    "total": total,
                });
                serde_json::to_string_pretty(&value).map_err(|e| {
                    ApiError::InvalidArgument(format!("Failed to render status: {}", e))
                })
            }
            "text" => Ok(format_status_text(
                &store_path,
                &self.config.store.collection,
                &counts,
            )),
            other => Err(ApiError::InvalidArgument(format!(
                "Unknown format '{}' (expected text or json)",
                other
            ))),
        }
    }
}
