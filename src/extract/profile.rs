//! Profile extraction for the profile stage.

use super::capture::Capture;
use super::dom::{clean_handle, parse_count};
use super::{DomSelectors, ExtractSettings, Strategy};
use crate::browser::{Page, UrlPattern, WaitUntil};
use crate::error::ExtractError;
use crate::models::ProfileRecord;
use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::debug;

pub const GET_PROFILE_ROUTE: &str = "**/xrpc/app.bsky.actor.getProfile";

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn extract(&self, page: &dyn Page, did: &str) -> Result<ProfileRecord, ExtractError>;
}

/// Reads the `getProfile` response the profile view fetches on load
pub struct NetworkProfile {
    settings: ExtractSettings,
}

impl NetworkProfile {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }
}

fn names_actor(body: &Value, actor: &str) -> bool {
    ["did", "handle"]
        .iter()
        .any(|key| body.get(*key).and_then(Value::as_str) == Some(actor))
}

#[async_trait]
impl ProfileExtractor for NetworkProfile {
    fn strategy(&self) -> Strategy {
        Strategy::Network
    }

    async fn extract(&self, page: &dyn Page, did: &str) -> Result<ProfileRecord, ExtractError> {
        let responses: Capture<Value> = Capture::new();
        let actor = did.to_string();
        // The view also fetches profiles of quoted and replied-to accounts
        page.intercept(
            UrlPattern::new(GET_PROFILE_ROUTE),
            responses.handler(move |_url, body| names_actor(&body, &actor).then_some(body)),
        )
        .await?;

        page.goto(&self.settings.profile_url(did), WaitUntil::NetworkIdle).await?;
        sleep(self.settings.settle).await;
        page.clear_intercepts().await?;

        let body = responses.take().pop().ok_or_else(|| {
            ExtractError::Empty(format!("no profile response captured for {}", did))
        })?;
        let profile =
            ProfileRecord::from_api(body).map_err(|e| ExtractError::Malformed(e.to_string()))?;
        debug!(did, handle = %profile.handle, "Captured profile payload");
        Ok(profile)
    }
}

/// Reads the labeled profile header regions
pub struct DomProfile {
    settings: ExtractSettings,
    selectors: DomSelectors,
}

impl DomProfile {
    pub fn new(settings: ExtractSettings, selectors: DomSelectors) -> Self {
        Self {
            settings,
            selectors,
        }
    }

    async fn first_text(
        &self,
        page: &dyn Page,
        selector: &str,
    ) -> Result<Option<String>, ExtractError> {
        let elements = page.query_all(selector, &[]).await?;
        Ok(elements
            .into_iter()
            .find_map(|element| element.text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

#[async_trait]
impl ProfileExtractor for DomProfile {
    fn strategy(&self) -> Strategy {
        Strategy::Dom
    }

    async fn extract(&self, page: &dyn Page, did: &str) -> Result<ProfileRecord, ExtractError> {
        page.goto(&self.settings.profile_url(did), WaitUntil::NetworkIdle).await?;
        sleep(self.settings.settle).await;

        let selectors = &self.selectors;
        let display_name = self.first_text(page, &selectors.display_name).await?;
        let handle = self
            .first_text(page, &selectors.handle)
            .await?
            .map(|text| clean_handle(&text));
        if display_name.is_none() && handle.is_none() {
            return Err(ExtractError::Empty(format!(
                "profile header not rendered for {}",
                did
            )));
        }

        let followers = self.first_text(page, &selectors.followers).await?;
        let following = self.first_text(page, &selectors.following).await?;
        let description = self.first_text(page, &selectors.description).await?;

        Ok(ProfileRecord {
            did: did.to_string(),
            handle: handle.unwrap_or_default(),
            display_name,
            description,
            followers_count: followers.as_deref().map_or(0, parse_count),
            following_count: following.as_deref().map_or(0, parse_count),
            posts_count: 0,
            avatar: None,
            banner: None,
            raw: None,
        })
    }
}
