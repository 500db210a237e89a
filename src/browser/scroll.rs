//! Scroll-driven pagination.

use super::Page;
use crate::error::BrowserError;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPolicy {
    /// Wait after each scroll before measuring again
    pub delay: Duration,
    /// Upper bound on scroll rounds for feeds that never stop growing
    pub max_rounds: usize,
}

impl ScrollPolicy {
    pub fn new(delay: Duration, max_rounds: usize) -> Self {
        Self { delay, max_rounds }
    }
}

/// Scroll to the bottom until two consecutive height measurements match.
///
/// Returns the number of scroll rounds performed.
pub async fn scroll_until_stable(page: &dyn Page, policy: ScrollPolicy) -> Result<usize, BrowserError> {
    let mut last_height = page.document_height().await?;
    for round in 1..=policy.max_rounds {
        page.scroll_to_bottom().await?;
        sleep(policy.delay).await;
        let height = page.document_height().await?;
        if height == last_height {
            debug!(round, height, "Document height stabilized");
            return Ok(round);
        }
        last_height = height;
    }
    debug!(
        rounds = policy.max_rounds,
        height = last_height,
        "Scroll budget exhausted before height stabilized"
    );
    Ok(policy.max_rounds)
}
