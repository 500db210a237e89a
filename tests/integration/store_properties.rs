use proptest::prelude::*;
use skyhive::error::StorageError;
use skyhive::store::{SledStatusStore, StatusStore, DEFAULT_COLLECTION};
use skyhive::types::UserStatus;
use std::collections::{BTreeSet, HashMap};

fn status_strategy() -> impl Strategy<Value = UserStatus> {
    prop_oneof![
        Just(UserStatus::Queued),
        Just(UserStatus::ProfileCollected),
        Just(UserStatus::PostsCollected),
        "[a-z_]{1,12}".prop_map(|label| UserStatus::parse(&label)),
        // Labels that embed the index separator ahead of another label's name
        ("(queued|profile_collected)?", "[a-z:]{0,10}")
            .prop_map(|(head, tail)| UserStatus::Other(format!("{}\0{}", head, tail))),
    ]
}

/// (user index, status, upsert) steps: upserts go through `add_user`, the rest through
/// `update_user_status`
fn ops_strategy() -> impl Strategy<Value = Vec<(u8, UserStatus, bool)>> {
    prop::collection::vec((0u8..12, status_strategy(), any::<bool>()), 0..60)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn list_by_status_is_bounded_distinct_and_pure(
        ops in ops_strategy(),
        limit in 0usize..15,
    ) {
        let store = SledStatusStore::temporary(DEFAULT_COLLECTION).unwrap();
        let mut model: HashMap<String, UserStatus> = HashMap::new();

        for (index, status, upsert) in ops {
            let did = format!("did:plc:user{}", index);
            if status.as_str().contains('\0') {
                let result = if upsert {
                    store.add_user(&did, &status)
                } else {
                    store.update_user_status(&did, &status)
                };
                prop_assert!(matches!(result, Err(StorageError::InvalidStatus(_))));
                continue;
            }
            if upsert {
                store.add_user(&did, &status).unwrap();
                model.insert(did, status);
            } else {
                let result = store.update_user_status(&did, &status);
                if model.contains_key(&did) {
                    prop_assert!(result.is_ok());
                    model.insert(did, status);
                } else {
                    prop_assert!(matches!(result, Err(StorageError::UserNotFound(_))));
                }
            }
        }

        for status in [UserStatus::Queued, UserStatus::ProfileCollected, UserStatus::PostsCollected] {
            let listed = store.list_by_status(&status, limit).unwrap();
            let distinct: BTreeSet<&String> = listed.iter().collect();
            let expected = model.values().filter(|s| **s == status).count();

            prop_assert!(listed.len() <= limit);
            prop_assert_eq!(distinct.len(), listed.len());
            prop_assert_eq!(listed.len(), expected.min(limit));
            for did in &listed {
                prop_assert_eq!(model.get(did), Some(&status));
            }
        }

        for (did, status) in &model {
            prop_assert_eq!(store.get_user_status(did).unwrap(), Some(status.clone()));
        }
        let counted: usize = store.count_by_status().unwrap().values().sum();
        prop_assert_eq!(counted, model.len());
    }
}

#[test]
fn test_unknown_user_has_no_status() {
    let store = SledStatusStore::temporary(DEFAULT_COLLECTION).unwrap();
    assert_eq!(store.get_user_status("did:plc:nobody").unwrap(), None);
}

#[test]
fn test_status_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("hive");
    {
        let store = SledStatusStore::open(&path, DEFAULT_COLLECTION).unwrap();
        store.add_user("did:plc:a", &UserStatus::Queued).unwrap();
        store
            .update_user_status("did:plc:a", &UserStatus::ProfileCollected)
            .unwrap();
        store.flush().unwrap();
    }

    let store = SledStatusStore::open(&path, DEFAULT_COLLECTION).unwrap();
    assert_eq!(
        store.get_user_status("did:plc:a").unwrap(),
        Some(UserStatus::ProfileCollected)
    );
    assert_eq!(
        store.list_by_status(&UserStatus::ProfileCollected, 5).unwrap(),
        vec!["did:plc:a".to_string()]
    );
    assert!(store
        .list_by_status(&UserStatus::Queued, 5)
        .unwrap()
        .is_empty());
}

#[test]
fn test_collections_are_isolated() {
    let dir = tempfile::TempDir::new().unwrap();
    let db = sled::open(dir.path().join("hive")).unwrap();
    let users = SledStatusStore::from_db(db.clone(), "bluesky_users").unwrap();
    let other = SledStatusStore::from_db(db, "other_users").unwrap();

    users.add_user("did:plc:a", &UserStatus::Queued).unwrap();
    assert_eq!(other.get_user_status("did:plc:a").unwrap(), None);
    assert!(other.count_by_status().unwrap().is_empty());
}
