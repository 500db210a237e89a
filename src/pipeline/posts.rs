//! Post stage: `profile_collected` → `posts_collected`.

use super::{close_page, open_page, Pipeline, Stage, StageReport};
use crate::browser::BrowserSession;
use crate::error::{ApiError, StorageError};
use crate::types::UserStatus;
use tracing::{info, warn};

impl Pipeline {
    /// Collect the author feed of up to `limit` users whose profile is collected.
    pub async fn collect_posts(
        &self,
        session: &dyn BrowserSession,
        limit: usize,
    ) -> Result<StageReport, ApiError> {
        self.run_batch(Stage::Posts, &UserStatus::ProfileCollected, limit, |did| {
            self.collect_user_posts(session, did)
        })
        .await
    }

    async fn collect_user_posts(
        &self,
        session: &dyn BrowserSession,
        did: String,
    ) -> Result<bool, StorageError> {
        let Some(page) = open_page(session, Stage::Posts, &did).await else {
            return Ok(false);
        };
        let extracted = self.extractors.posts.extract(page.as_ref(), &did).await;
        close_page(page).await;

        let posts = match extracted {
            Ok(posts) => posts,
            Err(e) => {
                warn!(did = %did, error = %e, "No posts were collected");
                return Ok(false);
            }
        };

        if let Err(e) = self.staging.append_posts(&did, &posts) {
            warn!(did = %did, error = %e, "Failed to stage posts");
            return Ok(false);
        }

        let advanced = self.advance(Stage::Posts, &did, &UserStatus::PostsCollected)?;
        if advanced {
            info!(did = %did, posts = posts.len(), "Collected posts");
        }
        Ok(advanced)
    }
}
