//! Author feed extraction for the post stage.

use super::capture::Capture;
use super::dom::{parse_count, post_uri_from_href};
use super::{DomSelectors, ExtractSettings, Strategy};
use crate::browser::{scroll_until_stable, Page, UrlPattern, WaitUntil};
use crate::error::ExtractError;
use crate::models::PostRecord;
use crate::types::is_did;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

pub const GET_AUTHOR_FEED_ROUTE: &str = "**/xrpc/app.bsky.feed.getAuthorFeed";

#[async_trait]
pub trait PostExtractor: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Every post the author feed of `did` yields within the scroll budget.
    async fn extract(&self, page: &dyn Page, did: &str) -> Result<Vec<PostRecord>, ExtractError>;
}

/// Keep the first record per URI; paginated pages can overlap.
fn dedup_by_uri(posts: impl IntoIterator<Item = PostRecord>) -> Vec<PostRecord> {
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| seen.insert(post.uri.clone()))
        .collect()
}

/// Accumulates every `getAuthorFeed` page fetched while the feed is scrolled
pub struct NetworkPosts {
    settings: ExtractSettings,
}

impl NetworkPosts {
    pub fn new(settings: ExtractSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl PostExtractor for NetworkPosts {
    fn strategy(&self) -> Strategy {
        Strategy::Network
    }

    async fn extract(&self, page: &dyn Page, did: &str) -> Result<Vec<PostRecord>, ExtractError> {
        let feed_pages: Capture<Vec<Value>> = Capture::new();
        page.intercept(
            UrlPattern::new(GET_AUTHOR_FEED_ROUTE),
            feed_pages.handler(|_url, body| match body.get("feed") {
                Some(Value::Array(items)) => Some(items.clone()),
                _ => None,
            }),
        )
        .await?;

        let url = self.settings.profile_url(did);
        info!(url = %url, "Navigating to profile for post collection");
        page.goto(&url, WaitUntil::NetworkIdle).await?;
        let rounds = scroll_until_stable(page, self.settings.post_scroll).await?;
        page.clear_intercepts().await?;

        let pages = feed_pages.take();
        debug!(did, rounds, pages = pages.len(), "Author feed pagination finished");

        let posts = dedup_by_uri(
            pages
                .iter()
                .flatten()
                .filter_map(PostRecord::from_feed_item),
        );
        if posts.is_empty() {
            return Err(ExtractError::Empty(format!("no posts captured for {}", did)));
        }
        Ok(posts)
    }
}

#[derive(Debug, Deserialize)]
struct RenderedPost {
    #[serde(default)]
    text: String,
    href: Option<String>,
    #[serde(default)]
    replies: String,
    #[serde(default)]
    reposts: String,
    #[serde(default)]
    likes: String,
}

/// Scrolls the rendered feed, then reads every feed item in one page script
pub struct DomPosts {
    settings: ExtractSettings,
    selectors: DomSelectors,
}

impl DomPosts {
    pub fn new(settings: ExtractSettings, selectors: DomSelectors) -> Self {
        Self {
            settings,
            selectors,
        }
    }

    fn feed_script(&self) -> String {
        let literal = |selector: &str| Value::from(selector).to_string();
        let s = &self.selectors;
        format!(
            r#"(() => {{
  const textOf = (item, sel) => {{ const el = item.querySelector(sel); return el ? el.innerText : ""; }};
  return Array.from(document.querySelectorAll({feed})).map((item) => {{
    const link = item.querySelector({link});
    return {{
      text: textOf(item, {text}),
      href: link ? link.getAttribute("href") : null,
      replies: textOf(item, {replies}),
      reposts: textOf(item, {reposts}),
      likes: textOf(item, {likes}),
    }};
  }});
}})()"#,
            feed = literal(&s.feed_item),
            link = literal(&s.post_link),
            text = literal(&s.post_text),
            replies = literal(&s.reply_count),
            reposts = literal(&s.repost_count),
            likes = literal(&s.like_count),
        )
    }
}

/// Record for one rendered feed item. Reposts link to the original author's permalink,
/// so the author comes from the link when it names a DID.
fn rendered_record(item: RenderedPost, profile_did: &str) -> Option<PostRecord> {
    let uri = item.href.as_deref().and_then(post_uri_from_href)?;
    let author_did = uri
        .strip_prefix("at://")
        .and_then(|rest| rest.split('/').next())
        .filter(|actor| is_did(actor))
        .unwrap_or(profile_did)
        .to_string();
    Some(PostRecord {
        uri,
        cid: None,
        author_did,
        text: item.text.trim().to_string(),
        created_at: None,
        reply_count: parse_count(&item.replies),
        repost_count: parse_count(&item.reposts),
        like_count: parse_count(&item.likes),
        quote_count: 0,
        embed_images: Vec::new(),
    })
}

#[async_trait]
impl PostExtractor for DomPosts {
    fn strategy(&self) -> Strategy {
        Strategy::Dom
    }

    async fn extract(&self, page: &dyn Page, did: &str) -> Result<Vec<PostRecord>, ExtractError> {
        let url = self.settings.profile_url(did);
        info!(url = %url, "Navigating to profile for post collection");
        // Scrolling waits for the feed itself
        page.goto(&url, WaitUntil::Load).await?;
        scroll_until_stable(page, self.settings.post_scroll).await?;

        let value = page.evaluate(&self.feed_script()).await?;
        let rendered: Vec<RenderedPost> =
            serde_json::from_value(value).map_err(|e| ExtractError::Malformed(e.to_string()))?;

        let posts = dedup_by_uri(
            rendered
                .into_iter()
                .filter_map(|item| rendered_record(item, did)),
        );
        if posts.is_empty() {
            return Err(ExtractError::Empty(format!("no rendered posts for {}", did)));
        }
        Ok(posts)
    }
}
