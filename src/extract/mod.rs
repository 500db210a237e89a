//! Extraction strategies
//!
//! Each stage reads through one trait: follows, profile, posts. Every trait has a
//! network-interception variant (reads the XRPC responses the web app fetches) and a
//! DOM variant (reads rendered markup). Which one runs is chosen per stage in config;
//! interception is the default because the API payloads drift less than markup.

pub mod capture;
pub mod dom;
pub mod follows;
pub mod posts;
pub mod profile;

pub use capture::Capture;
pub use follows::{DomFollows, FollowsCapture, FollowsExtractor, NetworkFollows};
pub use posts::{DomPosts, NetworkPosts, PostExtractor};
pub use profile::{DomProfile, NetworkProfile, ProfileExtractor};

use crate::browser::ScrollPolicy;
use crate::resolver::IdentityResolver;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Network,
    Dom,
}

/// Navigation and pagination knobs shared by all strategies
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Web app origin, e.g. `https://bsky.app`
    pub base_url: String,
    /// Extra wait after the network settles, for late renders
    pub settle: Duration,
    pub discovery_scroll: ScrollPolicy,
    pub post_scroll: ScrollPolicy,
}

impl ExtractSettings {
    pub fn profile_url(&self, actor: &str) -> String {
        format!("{}/profile/{}", self.base_url.trim_end_matches('/'), actor)
    }

    pub fn follows_url(&self, actor: &str) -> String {
        format!("{}/follows", self.profile_url(actor))
    }
}

/// CSS selectors used by the DOM strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSelectors {
    #[serde(default = "default_follow_link")]
    pub follow_link: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_handle")]
    pub handle: String,
    #[serde(default = "default_followers")]
    pub followers: String,
    #[serde(default = "default_following")]
    pub following: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_feed_item")]
    pub feed_item: String,
    #[serde(default = "default_post_text")]
    pub post_text: String,
    #[serde(default = "default_post_link")]
    pub post_link: String,
    #[serde(default = "default_reply_count")]
    pub reply_count: String,
    #[serde(default = "default_repost_count")]
    pub repost_count: String,
    #[serde(default = "default_like_count")]
    pub like_count: String,
}

fn default_follow_link() -> String {
    "a[href^='/profile/']".to_string()
}

fn default_display_name() -> String {
    "[data-testid='profileHeaderDisplayName']".to_string()
}

fn default_handle() -> String {
    "[data-testid='profileHeaderHandle']".to_string()
}

fn default_followers() -> String {
    "[data-testid='profileHeaderFollowersButton']".to_string()
}

fn default_following() -> String {
    "[data-testid='profileHeaderFollowsButton']".to_string()
}

fn default_description() -> String {
    "[data-testid='profileHeaderDescription']".to_string()
}

fn default_feed_item() -> String {
    "[data-testid^='feedItem-by-']".to_string()
}

fn default_post_text() -> String {
    "[data-testid='postText']".to_string()
}

fn default_post_link() -> String {
    "a[href*='/post/']".to_string()
}

fn default_reply_count() -> String {
    "[data-testid='replyBtn']".to_string()
}

fn default_repost_count() -> String {
    "[data-testid='repostCount']".to_string()
}

fn default_like_count() -> String {
    "[data-testid='likeCount']".to_string()
}

impl Default for DomSelectors {
    fn default() -> Self {
        Self {
            follow_link: default_follow_link(),
            display_name: default_display_name(),
            handle: default_handle(),
            followers: default_followers(),
            following: default_following(),
            description: default_description(),
            feed_item: default_feed_item(),
            post_text: default_post_text(),
            post_link: default_post_link(),
            reply_count: default_reply_count(),
            repost_count: default_repost_count(),
            like_count: default_like_count(),
        }
    }
}

/// The extractor chosen for each stage
#[derive(Clone)]
pub struct Extractors {
    pub follows: Arc<dyn FollowsExtractor>,
    pub profile: Arc<dyn ProfileExtractor>,
    pub posts: Arc<dyn PostExtractor>,
}

impl Extractors {
    pub fn select(
        follows: Strategy,
        profile: Strategy,
        posts: Strategy,
        settings: ExtractSettings,
        selectors: DomSelectors,
        resolver: Option<Arc<dyn IdentityResolver>>,
    ) -> Self {
        let follows: Arc<dyn FollowsExtractor> = match follows {
            Strategy::Network => Arc::new(NetworkFollows::new(settings.clone())),
            Strategy::Dom => Arc::new(DomFollows::new(
                settings.clone(),
                selectors.clone(),
                resolver,
            )),
        };
        let profile: Arc<dyn ProfileExtractor> = match profile {
            Strategy::Network => Arc::new(NetworkProfile::new(settings.clone())),
            Strategy::Dom => Arc::new(DomProfile::new(settings.clone(), selectors.clone())),
        };
        let posts: Arc<dyn PostExtractor> = match posts {
            Strategy::Network => Arc::new(NetworkPosts::new(settings)),
            Strategy::Dom => Arc::new(DomPosts::new(settings, selectors)),
        };
        Self {
            follows,
            profile,
            posts,
        }
    }
}
