//! Profile stage: `queued` → `profile_collected`.

use super::{close_page, open_page, Pipeline, Stage, StageReport};
use crate::browser::BrowserSession;
use crate::error::{ApiError, StorageError};
use crate::types::UserStatus;
use tracing::{info, warn};

impl Pipeline {
    /// Collect profiles for up to `limit` queued users.
    pub async fn collect_profiles(
        &self,
        session: &dyn BrowserSession,
        limit: usize,
    ) -> Result<StageReport, ApiError> {
        self.run_batch(Stage::Profiles, &UserStatus::Queued, limit, |did| {
            self.collect_profile(session, did)
        })
        .await
    }

    async fn collect_profile(
        &self,
        session: &dyn BrowserSession,
        did: String,
    ) -> Result<bool, StorageError> {
        let Some(page) = open_page(session, Stage::Profiles, &did).await else {
            return Ok(false);
        };
        let extracted = self.extractors.profile.extract(page.as_ref(), &did).await;
        close_page(page).await;

        let profile = match extracted {
            Ok(profile) => profile,
            Err(e) => {
                warn!(did = %did, error = %e, "No profile extracted, user stays queued");
                return Ok(false);
            }
        };

        let path = match self.staging.write_profile(&profile) {
            Ok(path) => path,
            Err(e) => {
                warn!(did = %did, error = %e, "Failed to stage profile, user stays queued");
                return Ok(false);
            }
        };

        let advanced = self.advance(Stage::Profiles, &did, &UserStatus::ProfileCollected)?;
        if advanced {
            info!(
                did = %did,
                handle = %profile.handle,
                path = %path.display(),
                "Collected profile"
            );
        }
        Ok(advanced)
    }
}
