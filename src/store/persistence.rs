//! Sled-backed status store.
//!
//! Two trees per collection: `<collection>` maps DID -> bincode `StatusRecord`, and
//! `<collection>.by_status` holds `status \0 did` keys so listing by status is a
//! prefix scan. Both trees change together inside one transaction.

use super::{StatusRecord, StatusStore};
use crate::error::StorageError;
use crate::types::{Did, UserStatus};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::Transactional;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Collection name used when the configuration does not set one
pub const DEFAULT_COLLECTION: &str = "bluesky_users";

/// Suffix of the per-collection index tree name
pub const INDEX_SUFFIX: &str = ".by_status";
const INDEX_SEPARATOR: u8 = 0;

pub struct SledStatusStore {
    db: sled::Db,
    records: sled::Tree,
    index: sled::Tree,
}

impl SledStatusStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path, collection: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(db, collection)
    }

    /// In-memory database removed on drop.
    pub fn temporary(collection: &str) -> Result<Self, StorageError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, collection)
    }

    /// Attach to an open database, creating the collection trees if they are absent.
    pub fn from_db(db: sled::Db, collection: &str) -> Result<Self, StorageError> {
        let records = ensure_collection(&db, collection)?;
        let index = ensure_collection(&db, &format!("{}{}", collection, INDEX_SUFFIX))?;
        Ok(Self { db, records, index })
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn write(&self, record: &StatusRecord, require_existing: bool) -> Result<(), StorageError> {
        let encoded = bincode::serialize(record)?;
        let key = record.did.as_bytes();
        let new_index_key = index_key(&record.status, &record.did)?;
        let empty: &[u8] = &[];

        let result = (&self.records, &self.index).transaction(
            |(records, index)| -> ConflictableTransactionResult<(), StorageError> {
                match records.get(key)? {
                    Some(previous) => {
                        let previous: StatusRecord = bincode::deserialize(&previous)
                            .map_err(|e| {
                                ConflictableTransactionError::Abort(StorageError::from(e))
                            })?;
                        let previous_key = index_key(&previous.status, &previous.did)
                            .map_err(ConflictableTransactionError::Abort)?;
                        index.remove(previous_key)?;
                    }
                    None if require_existing => {
                        return Err(ConflictableTransactionError::Abort(
                            StorageError::UserNotFound(record.did.clone()),
                        ));
                    }
                    None => {}
                }
                records.insert(key, encoded.as_slice())?;
                index.insert(new_index_key.as_slice(), empty)?;
                Ok(())
            },
        );

        result.map_err(|e| match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StorageError::Sled(e),
        })
    }
}

/// Existence check first, create only when the tree is confirmed absent.
///
/// Any backend error here is returned to the caller; nothing is ever dropped or recreated.
fn ensure_collection(db: &sled::Db, name: &str) -> Result<sled::Tree, StorageError> {
    let exists = db
        .tree_names()
        .iter()
        .any(|existing| existing.as_ref() == name.as_bytes());
    if exists {
        info!(collection = name, "Collection already exists");
    } else {
        info!(collection = name, "Collection not found, creating it");
    }
    Ok(db.open_tree(name)?)
}

/// Labels containing the separator would alias another label's prefix.
fn index_prefix(status: &UserStatus) -> Result<Vec<u8>, StorageError> {
    let label = status.as_str().as_bytes();
    if label.contains(&INDEX_SEPARATOR) {
        return Err(StorageError::InvalidStatus(
            status.as_str().escape_default().to_string(),
        ));
    }
    let mut prefix = label.to_vec();
    prefix.push(INDEX_SEPARATOR);
    Ok(prefix)
}

fn index_key(status: &UserStatus, did: &str) -> Result<Vec<u8>, StorageError> {
    let mut key = index_prefix(status)?;
    key.extend_from_slice(did.as_bytes());
    Ok(key)
}

impl StatusStore for SledStatusStore {
    fn add_user(&self, did: &str, status: &UserStatus) -> Result<(), StorageError> {
        self.write(&StatusRecord::new(did, status.clone()), false)?;
        info!(did = %did, status = %status, "Added user to the Hive Mind");
        Ok(())
    }

    fn get_user_status(&self, did: &str) -> Result<Option<UserStatus>, StorageError> {
        match self.records.get(did.as_bytes())? {
            Some(bytes) => {
                let record: StatusRecord = bincode::deserialize(&bytes)?;
                Ok(Some(record.status))
            }
            None => Ok(None),
        }
    }

    fn update_user_status(&self, did: &str, status: &UserStatus) -> Result<(), StorageError> {
        self.write(&StatusRecord::new(did, status.clone()), true)?;
        info!(did = %did, status = %status, "Updated user status");
        Ok(())
    }

    fn list_by_status(&self, status: &UserStatus, limit: usize) -> Result<Vec<Did>, StorageError> {
        let prefix = index_prefix(status)?;
        let mut dids = Vec::new();
        for key in self.index.scan_prefix(&prefix).keys().take(limit) {
            let key = key?;
            dids.push(String::from_utf8_lossy(&key[prefix.len()..]).into_owned());
        }
        debug!(status = %status, limit, found = dids.len(), "Listed users by status");
        Ok(dids)
    }

    fn count_by_status(&self) -> Result<BTreeMap<String, usize>, StorageError> {
        let mut counts = BTreeMap::new();
        for value in self.records.iter().values() {
            let record: StatusRecord = bincode::deserialize(&value?)?;
            *counts.entry(record.status.as_str().to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
