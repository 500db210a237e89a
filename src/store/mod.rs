//! Hive Mind Status Store
//!
//! Tracks every discovered user and the pipeline status it has reached.
//! Acts as the work queue for the profile and post stages.

pub mod persistence;

use crate::error::StorageError;
use crate::types::{Did, UserStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use persistence::{SledStatusStore, DEFAULT_COLLECTION, INDEX_SUFFIX};

/// StatusRecord: one per user, keyed by DID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub did: Did,
    pub status: UserStatus,
    pub updated_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(did: &str, status: UserStatus) -> Self {
        Self {
            did: did.to_string(),
            status,
            updated_at: Utc::now(),
        }
    }
}

/// Status store interface
///
/// Upserts and updates are atomic per key. Listing makes no ordering promise.
pub trait StatusStore: Send + Sync {
    /// Insert or overwrite the record for `did`. Callers enqueue with `UserStatus::Queued`.
    fn add_user(&self, did: &str, status: &UserStatus) -> Result<(), StorageError>;

    /// Point lookup; `None` means the user was never enqueued.
    fn get_user_status(&self, did: &str) -> Result<Option<UserStatus>, StorageError>;

    /// Overwrite the status of a known user.
    ///
    /// Fails with `StorageError::UserNotFound` when `did` is absent.
    fn update_user_status(&self, did: &str, status: &UserStatus) -> Result<(), StorageError>;

    /// Up to `limit` distinct users currently at `status`.
    fn list_by_status(&self, status: &UserStatus, limit: usize) -> Result<Vec<Did>, StorageError>;

    /// Number of users per status label.
    fn count_by_status(&self) -> Result<BTreeMap<String, usize>, StorageError>;
}
