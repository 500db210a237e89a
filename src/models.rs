//! Scraped record models
//!
//! Profiles and posts as written to the staging area. Parsing is lenient: payloads
//! are not schema-validated, missing counts default to zero.

use crate::types::Did;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile of a single user, overwritten in staging on every successful collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub did: Did,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub followers_count: u64,
    /// The profile API names this `followsCount`
    #[serde(default, alias = "followsCount")]
    pub following_count: u64,
    #[serde(default)]
    pub posts_count: u64,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    /// Full API payload when the profile was captured by network interception
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ProfileRecord {
    /// Build a record from an `app.bsky.actor.getProfile` response body.
    pub fn from_api(body: Value) -> Result<Self, serde_json::Error> {
        let mut record: ProfileRecord = serde_json::from_value(body.clone())?;
        record.raw = Some(body);
        Ok(record)
    }
}

/// One post captured from an author feed, appended to the author's post log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    pub uri: String,
    #[serde(default)]
    pub cid: Option<String>,
    pub author_did: Did,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub quote_count: u64,
    #[serde(default)]
    pub embed_images: Vec<String>,
}

impl PostRecord {
    /// Build a record from one entry of an `app.bsky.feed.getAuthorFeed` `feed` array.
    ///
    /// Returns `None` when the entry carries no post URI or author.
    pub fn from_feed_item(item: &Value) -> Option<Self> {
        let post = item.get("post")?;
        let uri = post.get("uri")?.as_str()?.to_string();
        let author_did = post.pointer("/author/did")?.as_str()?.to_string();
        let record = post.get("record");

        let embed_images = post
            .pointer("/embed/images")
            .and_then(Value::as_array)
            .map(|images| {
                images
                    .iter()
                    .filter_map(|image| image.get("fullsize").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Some(PostRecord {
            uri,
            cid: post.get("cid").and_then(Value::as_str).map(String::from),
            author_did,
            text: record
                .and_then(|r| r.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            created_at: record
                .and_then(|r| r.get("createdAt"))
                .and_then(Value::as_str)
                .map(String::from),
            reply_count: count_field(post, "replyCount"),
            repost_count: count_field(post, "repostCount"),
            like_count: count_field(post, "likeCount"),
            quote_count: count_field(post, "quoteCount"),
            embed_images,
        })
    }
}

fn count_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}
