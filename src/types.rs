//! Core types for the crawl queue.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Did: decentralized identifier naming a user account (`did:plc:...`, `did:web:...`)
pub type Did = String;

/// Returns true when `value` has the `did:<method>:<id>` shape.
pub fn is_did(value: &str) -> bool {
    let mut parts = value.splitn(3, ':');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty()
    )
}

/// Progress label of a user in the pipeline.
///
/// The set is open: labels this crate does not know round-trip through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserStatus {
    Queued,
    ProfileCollected,
    PostsCollected,
    Other(String),
}

impl UserStatus {
    pub fn as_str(&self) -> &str {
        match self {
            UserStatus::Queued => "queued",
            UserStatus::ProfileCollected => "profile_collected",
            UserStatus::PostsCollected => "posts_collected",
            UserStatus::Other(label) => label,
        }
    }

    pub fn parse(label: &str) -> Self {
        match label {
            "queued" => UserStatus::Queued,
            "profile_collected" => UserStatus::ProfileCollected,
            "posts_collected" => UserStatus::PostsCollected,
            other => UserStatus::Other(other.to_string()),
        }
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        UserStatus::Queued
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(UserStatus::parse(s))
    }
}

impl From<&str> for UserStatus {
    fn from(label: &str) -> Self {
        UserStatus::parse(label)
    }
}

impl Serialize for UserStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(UserStatus::parse(&label))
    }
}
