//! Following-list extraction for the discovery stage.

use super::capture::Capture;
use super::dom::profile_actor_from_href;
use super::{DomSelectors, ExtractSettings, Strategy};
use crate::browser::{scroll_until_stable, Page, UrlPattern, WaitUntil};
use crate::error::ExtractError;
use crate::resolver::IdentityResolver;
use crate::types::{is_did, Did};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const GET_FOLLOWS_ROUTE: &str = "**/xrpc/app.bsky.graph.getFollows";

/// Everything one discovery run saw on the seed's following list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowsCapture {
    /// DID of the account whose follows were listed, when the payload names it
    pub subject: Option<Did>,
    /// Followed accounts, de-duplicated
    pub identifiers: BTreeSet<Did>,
    /// Raw follow entries in arrival order, for staging
    pub raw: Vec<Value>,
}

#[async_trait]
pub trait FollowsExtractor: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Read the accounts `seed` follows. `seed` is a DID or a handle.
    async fn extract(&self, page: &dyn Page, seed: &str) -> Result<FollowsCapture, ExtractError>;
}

/// Captures every `getFollows` page the app fetches while the list is scrolled
pub struct NetworkFollows {
    settings: ExtractSettings,
}

impl NetworkFollows {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl FollowsExtractor for NetworkFollows {
    fn strategy(&self) -> Strategy {
        Strategy::Network
    }

    async fn extract(&self, page: &dyn Page, seed: &str) -> Result<FollowsCapture, ExtractError> {
        let pages: Capture<Value> = Capture::new();
        page.intercept(
            UrlPattern::new(GET_FOLLOWS_ROUTE),
            pages.handler(|_url, body| Some(body)),
        )
        .await?;

        let url = self.settings.follows_url(seed);
        info!(url = %url, "Navigating to follows list");
        page.goto(&url, WaitUntil::NetworkIdle).await?;
        let rounds = scroll_until_stable(page, self.settings.discovery_scroll).await?;
        page.clear_intercepts().await?;

        let bodies = pages.take();
        debug!(seed, rounds, pages = bodies.len(), "Follows pagination finished");
        if bodies.is_empty() {
            return Err(ExtractError::Empty(format!(
                "no follows responses captured for {}",
                seed
            )));
        }

        let mut capture = FollowsCapture::default();
        for body in bodies {
            if capture.subject.is_none() {
                capture.subject = body
                    .pointer("/subject/did")
                    .and_then(Value::as_str)
                    .map(String::from);
            }
            let Some(entries) = body.get("follows").and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                match entry.get("did").and_then(Value::as_str) {
                    Some(did) if is_did(did) => {
                        capture.identifiers.insert(did.to_string());
                    }
                    _ => debug!("Dropping follow entry without a DID"),
                }
                capture.raw.push(entry.clone());
            }
        }
        Ok(capture)
    }
}

/// Scrolls the rendered list, then reads profile links
pub struct DomFollows {
    settings: ExtractSettings,
    selectors: DomSelectors,
    resolver: Option<Arc<dyn IdentityResolver>>,
}

impl DomFollows {
    pub fn new(
        settings: ExtractSettings,
        selectors: DomSelectors,
        resolver: Option<Arc<dyn IdentityResolver>>,
    ) -> Self {
        Self {
            settings,
            selectors,
            resolver,
        }
    }

    async fn to_did(&self, actor: &str) -> Option<Did> {
        if is_did(actor) {
            return Some(actor.to_string());
        }
        let resolver = self.resolver.as_ref()?;
        match resolver.resolve_handle(actor).await {
            Ok(did) => Some(did),
            Err(e) => {
                warn!(handle = actor, error = %e, "Dropping unresolvable handle");
                None
            }
        }
    }
}

#[async_trait]
impl FollowsExtractor for DomFollows {
    fn strategy(&self) -> Strategy {
        Strategy::Dom
    }

    async fn extract(&self, page: &dyn Page, seed: &str) -> Result<FollowsCapture, ExtractError> {
        let url = self.settings.follows_url(seed);
        info!(url = %url, "Navigating to follows list");
        page.goto(&url, WaitUntil::NetworkIdle).await?;
        scroll_until_stable(page, self.settings.discovery_scroll).await?;

        let links = page
            .query_all(&self.selectors.follow_link, &["href"])
            .await?;

        let mut actors = BTreeSet::new();
        for link in &links {
            if let Some(actor) = link.attribute("href").and_then(profile_actor_from_href) {
                if actor != seed {
                    actors.insert(actor);
                }
            }
        }

        let mut capture = FollowsCapture::default();
        for actor in actors {
            let Some(did) = self.to_did(&actor).await else {
                continue;
            };
            // The seed's own header link resolves to the seed
            if did == seed {
                continue;
            }
            capture.raw.push(serde_json::json!({ "did": did, "actor": actor }));
            capture.identifiers.insert(did);
        }
        if is_did(seed) {
            capture.subject = Some(seed.to_string());
        }

        if capture.identifiers.is_empty() {
            return Err(ExtractError::Empty(format!(
                "no profile links found on follows list of {}",
                seed
            )));
        }
        Ok(capture)
    }
}
