//! Discovery stage: enqueue the accounts a seed follows.

use super::{close_page, open_page, Pipeline, Stage, StageReport};
use crate::browser::BrowserSession;
use crate::error::ApiError;
use crate::types::{is_did, UserStatus};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Seed taken from a seed file: its first non-empty line, reduced to the last path
/// segment so a pasted profile URL works as well as a bare handle or DID.
pub fn seed_from_file(path: &Path) -> Result<String, ApiError> {
    let content = fs::read_to_string(path).map_err(|e| {
        ApiError::InvalidArgument(format!(
            "no seed given and seed file {} is unreadable: {}",
            path.display(),
            e
        ))
    })?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.trim_end_matches('/').rsplit('/').next())
        .filter(|seed| !seed.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            ApiError::InvalidArgument(format!("seed file {} is empty", path.display()))
        })
}

impl Pipeline {
    /// Enqueue every account `seed` follows that the store does not know yet.
    ///
    /// Navigation and extraction failures end the stage with `failed = 1`; only store
    /// failures are returned as errors.
    pub async fn discover(
        &self,
        session: &dyn BrowserSession,
        seed: &str,
    ) -> Result<StageReport, ApiError> {
        let mut report = StageReport::new(Stage::Discovery);
        let seed = self.resolve_seed(seed).await;
        info!(stage = %Stage::Discovery, seed = %seed, "Starting discovery");

        let Some(page) = open_page(session, Stage::Discovery, &seed).await else {
            report.failed = 1;
            return Ok(report);
        };
        let extracted = self.extractors.follows.extract(page.as_ref(), &seed).await;
        close_page(page).await;

        let capture = match extracted {
            Ok(capture) => capture,
            Err(e) => {
                warn!(stage = %Stage::Discovery, seed = %seed, error = %e, "Discovery failed");
                report.failed = 1;
                return Ok(report);
            }
        };

        let subject = capture.subject.as_deref().unwrap_or(&seed);
        if !capture.raw.is_empty() {
            if let Err(e) = self.staging.append_follows(subject, &capture.raw) {
                warn!(subject, error = %e, "Failed to stage follows payload");
            }
        }

        report.selected = capture.identifiers.len();
        for did in &capture.identifiers {
            if self.store.get_user_status(did)?.is_some() {
                debug!(did = %did, "User already known, skipping");
                report.skipped += 1;
                continue;
            }
            self.store.add_user(did, &UserStatus::Queued)?;
            report.succeeded += 1;
        }

        info!(
            stage = %Stage::Discovery,
            found = report.selected,
            queued = report.succeeded,
            known = report.skipped,
            "Discovery finished"
        );
        Ok(report)
    }

    /// DID for `seed`, falling back to the handle itself when resolution is
    /// unavailable or fails; the web app accepts either in profile URLs.
    async fn resolve_seed(&self, seed: &str) -> String {
        let seed = seed.trim().trim_start_matches('@');
        if is_did(seed) {
            return seed.to_string();
        }
        let Some(resolver) = &self.resolver else {
            return seed.to_string();
        };
        match resolver.resolve_handle(seed).await {
            Ok(did) => {
                info!(handle = seed, did = %did, "Resolved seed handle");
                did
            }
            Err(e) => {
                warn!(
                    handle = seed,
                    error = %e,
                    "Could not resolve seed handle, using it as is"
                );
                seed.to_string()
            }
        }
    }
}
