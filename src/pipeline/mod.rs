//! Crawl pipeline
//!
//! Discovery enqueues users, the profile stage advances `queued` users to
//! `profile_collected`, the post stage advances those to `posts_collected`. Each stage
//! reads its batch from the status store, so a user left behind by a failure is simply
//! picked up again by the next run.
//!
//! Browser, extraction and staging failures fail only the unit they happen in. Store
//! failures abort the stage and the run.

pub mod discovery;
pub mod pool;
pub mod posts;
pub mod profile;

pub use discovery::seed_from_file;
pub use pool::BatchPool;

use crate::browser::{BrowserSession, Page};
use crate::error::{ApiError, StorageError};
use crate::extract::Extractors;
use crate::resolver::IdentityResolver;
use crate::staging::StagingArea;
use crate::store::StatusStore;
use crate::types::{Did, UserStatus};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Profiles,
    Posts,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discovery => "discovery",
            Stage::Profiles => "profiles",
            Stage::Posts => "posts",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome counts of one stage run
///
/// For discovery, `selected` is the number of distinct users found on the follows list,
/// `succeeded` the number newly queued and `skipped` those already known. For the
/// collection stages, `selected` is the batch size read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub selected: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageReport {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            selected: 0,
            succeeded: 0,
            skipped: 0,
            failed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub discovery: StageReport,
    pub profiles: StageReport,
    pub posts: StageReport,
}

impl PipelineReport {
    pub fn stages(&self) -> [&StageReport; 3] {
        [&self.discovery, &self.profiles, &self.posts]
    }
}

pub struct Pipeline {
    store: Arc<dyn StatusStore>,
    staging: StagingArea,
    extractors: Extractors,
    resolver: Option<Arc<dyn IdentityResolver>>,
    pool: BatchPool,
}

impl Pipeline {
    pub fn new(store: Arc<dyn StatusStore>, staging: StagingArea, extractors: Extractors) -> Self {
        Self {
            store,
            staging,
            extractors,
            resolver: None,
            pool: BatchPool::new(1),
        }
    }

    /// Resolve handle seeds to DIDs before discovery.
    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Maximum number of users processed at once by the collection stages.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.pool = BatchPool::new(concurrency);
        self
    }

    pub fn store(&self) -> &dyn StatusStore {
        self.store.as_ref()
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Discovery, then profiles, then posts, in one browser session.
    pub async fn run(
        &self,
        session: &dyn BrowserSession,
        seed: &str,
        profile_limit: usize,
        post_limit: usize,
    ) -> Result<PipelineReport, ApiError> {
        info!(seed, profile_limit, post_limit, "Running full pipeline");
        let discovery = self.discover(session, seed).await?;
        let profiles = self.collect_profiles(session, profile_limit).await?;
        let posts = self.collect_posts(session, post_limit).await?;
        info!("Pipeline finished");
        Ok(PipelineReport {
            discovery,
            profiles,
            posts,
        })
    }

    /// Select a batch, run `unit` over it through the pool and tally the outcomes.
    ///
    /// Every unit runs to completion before a store failure is returned.
    async fn run_batch<F, Fut>(
        &self,
        stage: Stage,
        from: &UserStatus,
        limit: usize,
        unit: F,
    ) -> Result<StageReport, ApiError>
    where
        F: Fn(Did) -> Fut,
        Fut: Future<Output = Result<bool, StorageError>>,
    {
        let mut report = StageReport::new(stage);
        let batch = self.store.list_by_status(from, limit)?;
        report.selected = batch.len();
        if batch.is_empty() {
            info!(stage = %stage, status = %from, "No users to process");
            return Ok(report);
        }
        info!(
            stage = %stage,
            users = batch.len(),
            concurrency = self.pool.concurrency(),
            "Processing batch"
        );

        let outcomes = self.pool.run(batch, unit).await;
        let mut store_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    report.failed += 1;
                    if store_error.is_none() {
                        store_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = store_error {
            return Err(e.into());
        }

        info!(
            stage = %stage,
            succeeded = report.succeeded,
            failed = report.failed,
            "Stage finished"
        );
        Ok(report)
    }

    /// Record a unit's success; a user that vanished from the store fails the unit only.
    fn advance(&self, stage: Stage, did: &str, status: &UserStatus) -> Result<bool, StorageError> {
        match self.store.update_user_status(did, status) {
            Ok(()) => Ok(true),
            Err(StorageError::UserNotFound(_)) => {
                warn!(
                    stage = %stage,
                    did,
                    "User disappeared from the store before its status could advance"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Open a page for one unit of work, logging instead of failing.
async fn open_page(
    session: &dyn BrowserSession,
    stage: Stage,
    did: &str,
) -> Option<Box<dyn Page>> {
    match session.new_page().await {
        Ok(page) => Some(page),
        Err(e) => {
            warn!(stage = %stage, did, error = %e, "Failed to open page");
            None
        }
    }
}

async fn close_page(page: Box<dyn Page>) {
    if let Err(e) = page.close().await {
        debug!(error = %e, "Failed to close page");
    }
}
