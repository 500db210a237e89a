use crate::support::*;
use serde_json::json;
use skyhive::browser::WaitUntil;
use skyhive::error::{ApiError, StorageError};
use skyhive::extract::Strategy;
use skyhive::pipeline::Pipeline;
use skyhive::resolver::IdentityResolver;
use skyhive::store::StatusStore;
use skyhive::types::{Did, UserStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

const SEED: &str = "did:plc:seed";
const A: &str = "did:plc:a";
const B: &str = "did:plc:b";
const C: &str = "did:plc:c";

fn queued(harness: &Harness) -> BTreeSet<Did> {
    harness
        .store
        .list_by_status(&UserStatus::Queued, 100)
        .unwrap()
        .into_iter()
        .collect()
}

fn status_of(harness: &Harness, did: &str) -> Option<UserStatus> {
    harness.store.get_user_status(did).unwrap()
}

fn script_profile(harness: &Harness, did: &str, handle: &str) {
    harness.browser.script(
        profile_url(did),
        PageScript::responses(vec![vec![profile_response(did, handle)]]),
    );
}

fn script_feed(harness: &Harness, did: &str, pages: &[&[&str]]) {
    let batches = pages
        .iter()
        .map(|rkeys| vec![feed_response(did, rkeys)])
        .collect();
    harness
        .browser
        .script(profile_url(did), PageScript::responses(batches));
}

#[tokio::test]
async fn test_discovery_queues_every_followed_account() {
    let harness = Harness::new();
    harness.browser.script(
        follows_url(SEED),
        PageScript::responses(vec![
            vec![follows_response(SEED, &[A])],
            vec![follows_response(SEED, &[B])],
        ]),
    );

    let report = harness
        .pipeline()
        .discover(&harness.browser, SEED)
        .await
        .unwrap();

    assert_eq!(queued(&harness), BTreeSet::from([A.to_string(), B.to_string()]));
    assert_eq!(report.selected, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.staging.read_follows(SEED).unwrap().len(), 2);
    assert_eq!(harness.browser.open_pages(), 0);
}

#[tokio::test]
async fn test_rediscovery_never_resets_known_users() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::Queued).unwrap();
    harness
        .store
        .update_user_status(A, &UserStatus::ProfileCollected)
        .unwrap();
    harness.browser.script(
        follows_url(SEED),
        PageScript::responses(vec![vec![follows_response(SEED, &[A, B, C])]]),
    );

    let pipeline = harness.pipeline();
    let first = pipeline.discover(&harness.browser, SEED).await.unwrap();
    assert_eq!(first.succeeded, 2);
    assert_eq!(first.skipped, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::ProfileCollected));

    let before = harness.store.count_by_status().unwrap();
    let second = pipeline.discover(&harness.browser, SEED).await.unwrap();
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(harness.store.count_by_status().unwrap(), before);
}

#[tokio::test]
async fn test_discovery_failure_is_reported_not_raised() {
    let harness = Harness::new();
    harness
        .browser
        .script(follows_url(SEED), PageScript::failing());

    let report = harness
        .pipeline()
        .discover(&harness.browser, SEED)
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 0);
    assert!(harness.store.count_by_status().unwrap().is_empty());
    assert_eq!(harness.browser.open_pages(), 0);
}

#[tokio::test]
async fn test_discovery_without_follows_responses_fails_softly() {
    let harness = Harness::new();
    harness
        .browser
        .script(follows_url(SEED), PageScript::responses(vec![vec![]]));

    let report = harness
        .pipeline()
        .discover(&harness.browser, SEED)
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_handle_seed_is_resolved_before_navigation() {
    let harness = Harness::new();
    harness.browser.script(
        follows_url(SEED),
        PageScript::responses(vec![vec![follows_response(SEED, &[A])]]),
    );
    let resolver: Arc<dyn IdentityResolver> = Arc::new(StaticResolver::with("seed.test", SEED));

    let report = harness
        .pipeline_with(Strategy::Network, Some(resolver))
        .discover(&harness.browser, "@seed.test")
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(harness.browser.visits(), vec![follows_url(SEED)]);
}

#[tokio::test]
async fn test_unresolvable_handle_seed_is_used_as_is() {
    let harness = Harness::new();
    harness.browser.script(
        follows_url("alice.test"),
        PageScript::responses(vec![vec![follows_response(SEED, &[A])]]),
    );
    let resolver: Arc<dyn IdentityResolver> = Arc::new(StaticResolver::default());

    let report = harness
        .pipeline_with(Strategy::Network, Some(resolver))
        .discover(&harness.browser, "alice.test")
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    // Staged under the subject the response reported
    assert_eq!(harness.staging.read_follows(SEED).unwrap().len(), 1);
}

#[tokio::test]
async fn test_profile_stage_advances_queued_user() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::Queued).unwrap();
    script_profile(&harness, A, "alice.test");

    let report = harness
        .pipeline()
        .collect_profiles(&harness.browser, 10)
        .await
        .unwrap();

    assert_eq!(report.selected, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::ProfileCollected));

    let profile = harness.staging.read_profile(A).unwrap().unwrap();
    assert_eq!(profile.handle, "alice.test");
    assert_eq!(profile.followers_count, 120);
    assert_eq!(profile.following_count, 80);
    let files = std::fs::read_dir(harness.staging.root().join("profiles"))
        .unwrap()
        .count();
    assert_eq!(files, 1);
}

#[tokio::test]
async fn test_failed_profile_is_retried_on_next_run() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::Queued).unwrap();
    harness.browser.script(profile_url(A), PageScript::failing());
    let pipeline = harness.pipeline();

    let first = pipeline.collect_profiles(&harness.browser, 10).await.unwrap();
    assert_eq!(first.failed, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::Queued));
    assert!(harness.staging.read_profile(A).unwrap().is_none());

    script_profile(&harness, A, "alice.test");
    let second = pipeline.collect_profiles(&harness.browser, 10).await.unwrap();
    assert_eq!(second.succeeded, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::ProfileCollected));
}

#[tokio::test]
async fn test_profile_stage_ignores_responses_for_other_accounts() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::Queued).unwrap();
    harness.browser.script(
        profile_url(A),
        PageScript::responses(vec![vec![profile_response(B, "bob.test")]]),
    );

    let report = harness
        .pipeline()
        .collect_profiles(&harness.browser, 10)
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::Queued));
}

#[tokio::test]
async fn test_profile_batch_respects_limit() {
    let harness = Harness::new();
    for did in [A, B, C] {
        harness.store.add_user(did, &UserStatus::Queued).unwrap();
        script_profile(&harness, did, "someone.test");
    }

    let report = harness
        .pipeline()
        .collect_profiles(&harness.browser, 2)
        .await
        .unwrap();

    assert_eq!(report.selected, 2);
    assert_eq!(queued(&harness).len(), 1);
}

#[tokio::test]
async fn test_empty_feed_leaves_user_at_profile_collected() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::ProfileCollected).unwrap();
    harness.store.add_user(B, &UserStatus::ProfileCollected).unwrap();
    script_feed(&harness, A, &[&[]]);
    harness.browser.script(profile_url(B), PageScript::failing());

    let report = harness
        .pipeline()
        .collect_posts(&harness.browser, 10)
        .await
        .unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(status_of(&harness, A), Some(UserStatus::ProfileCollected));
    assert_eq!(status_of(&harness, B), Some(UserStatus::ProfileCollected));
    assert!(harness.staging.read_posts(A).unwrap().is_empty());
}

#[tokio::test]
async fn test_post_pages_are_merged_without_duplicates() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::ProfileCollected).unwrap();
    script_feed(&harness, A, &[&["p1", "p2"], &["p2", "p3"]]);

    let report = harness
        .pipeline()
        .collect_posts(&harness.browser, 10)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::PostsCollected));
    let uris: Vec<String> = harness
        .staging
        .read_posts(A)
        .unwrap()
        .into_iter()
        .map(|post| post.uri)
        .collect();
    assert_eq!(
        uris,
        vec![
            format!("at://{}/app.bsky.feed.post/p1", A),
            format!("at://{}/app.bsky.feed.post/p2", A),
            format!("at://{}/app.bsky.feed.post/p3", A),
        ]
    );
}

#[tokio::test]
async fn test_post_logs_accumulate_across_runs() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::ProfileCollected).unwrap();
    script_feed(&harness, A, &[&["p1", "p2"]]);
    let pipeline = harness.pipeline();

    pipeline.collect_posts(&harness.browser, 10).await.unwrap();
    harness
        .store
        .update_user_status(A, &UserStatus::ProfileCollected)
        .unwrap();
    pipeline.collect_posts(&harness.browser, 10).await.unwrap();

    assert_eq!(harness.staging.read_posts(A).unwrap().len(), 4);
}

#[tokio::test]
async fn test_collection_stages_respect_concurrency_ceiling() {
    let harness = Harness::new();
    harness.browser.set_goto_delay(Duration::from_millis(20));
    let users: Vec<String> = (0..6).map(|i| format!("did:plc:u{}", i)).collect();
    for did in &users {
        harness.store.add_user(did, &UserStatus::Queued).unwrap();
        script_profile(&harness, did, "someone.test");
    }

    let pipeline = harness.pipeline().with_concurrency(2);
    let report = pipeline
        .collect_profiles(&harness.browser, 10)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 6);
    assert_eq!(harness.browser.peak_pages(), 2);
    assert_eq!(harness.browser.pages_opened(), 6);
    assert_eq!(harness.browser.open_pages(), 0);
}

#[tokio::test]
async fn test_full_run_moves_users_through_every_stage() {
    let harness = Harness::new();
    harness.browser.script(
        follows_url(SEED),
        PageScript::responses(vec![vec![follows_response(SEED, &[A, B])]]),
    );
    for (did, handle) in [(A, "alice.test"), (B, "bob.test")] {
        // Profile and feed responses arrive on the same profile view
        harness.browser.script(
            profile_url(did),
            PageScript::responses(vec![vec![
                profile_response(did, handle),
                feed_response(did, &["p1"]),
            ]]),
        );
    }

    let report = harness
        .pipeline()
        .run(&harness.browser, SEED, 10, 10)
        .await
        .unwrap();

    assert_eq!(report.discovery.succeeded, 2);
    assert_eq!(report.profiles.succeeded, 2);
    assert_eq!(report.posts.succeeded, 2);
    assert_eq!(
        harness.store.count_by_status().unwrap(),
        BTreeMap::from([("posts_collected".to_string(), 2)])
    );
}

#[tokio::test]
async fn test_dom_strategies_collect_from_rendered_markup() {
    let harness = Harness::new();
    let follows = PageScript::default().with_elements(
        "a[href^='/profile/']",
        vec![
            link("/profile/did:plc:a"),
            link("https://bsky.app/profile/did:plc:b"),
            link("/profile/did:plc:seed"),
            link("/profile/did:plc:a/post/3k"),
            link("/profile/carol.test"),
            link("/profile/nobody.test"),
        ],
    );
    harness.browser.script(follows_url(SEED), follows);

    let resolver: Arc<dyn IdentityResolver> = Arc::new(StaticResolver::with("carol.test", C));
    let pipeline = harness.pipeline_with(Strategy::Dom, Some(resolver));

    let discovery = pipeline.discover(&harness.browser, SEED).await.unwrap();
    assert_eq!(
        queued(&harness),
        BTreeSet::from([A.to_string(), B.to_string(), C.to_string()])
    );
    assert_eq!(discovery.succeeded, 3);

    harness.browser.script(
        profile_url(A),
        PageScript::default()
            .with_elements("[data-testid='profileHeaderDisplayName']", vec![text("Alice")])
            .with_elements("[data-testid='profileHeaderHandle']", vec![text("@alice.test")])
            .with_elements(
                "[data-testid='profileHeaderFollowersButton']",
                vec![text("1,234 followers")],
            )
            .with_elements(
                "[data-testid='profileHeaderFollowsButton']",
                vec![text("56 following")],
            )
            .with_evaluation(json!([
                { "text": "hello", "href": "/profile/did:plc:a/post/r1", "replies": "1", "reposts": "2", "likes": "3" },
                { "text": "hello", "href": "/profile/did:plc:a/post/r1", "replies": "1", "reposts": "2", "likes": "3" },
                { "text": "boosted", "href": "/profile/did:plc:orig/post/r9", "likes": "7" },
                { "text": "no link" }
            ])),
    );

    // Only A has a rendered profile; B and C stay queued
    let profiles = pipeline.collect_profiles(&harness.browser, 10).await.unwrap();
    assert_eq!(profiles.succeeded, 1);
    assert_eq!(profiles.failed, 2);

    let profile = harness.staging.read_profile(A).unwrap().unwrap();
    assert_eq!(profile.handle, "alice.test");
    assert_eq!(profile.display_name.as_deref(), Some("Alice"));
    assert_eq!(profile.followers_count, 1234);
    assert_eq!(profile.following_count, 56);

    let posts = pipeline.collect_posts(&harness.browser, 5).await.unwrap();
    assert_eq!(posts.succeeded, 1);
    let staged = harness.staging.read_posts(A).unwrap();
    assert_eq!(staged.len(), 2);
    assert_eq!(staged[0].uri, "at://did:plc:a/app.bsky.feed.post/r1");
    assert_eq!(staged[0].author_did, A);
    assert_eq!(staged[0].like_count, 3);
    // A repost keeps its original author
    assert_eq!(staged[1].author_did, "did:plc:orig");
    assert_eq!(status_of(&harness, A), Some(UserStatus::PostsCollected));
    // The rendered feed is read after the load event and scrolling, not network idle
    assert_eq!(harness.browser.waits().last(), Some(&WaitUntil::Load));
}

#[tokio::test]
async fn test_profile_failure_does_not_cancel_siblings() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::Queued).unwrap();
    harness.store.add_user(B, &UserStatus::Queued).unwrap();
    harness.browser.script(profile_url(A), PageScript::failing());
    script_profile(&harness, B, "bob.test");

    let report = harness
        .pipeline()
        .with_concurrency(2)
        .collect_profiles(&harness.browser, 10)
        .await
        .unwrap();

    assert_eq!(report.selected, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::Queued));
    assert_eq!(status_of(&harness, B), Some(UserStatus::ProfileCollected));
    assert!(harness.staging.read_profile(B).unwrap().is_some());
}

#[tokio::test]
async fn test_post_failure_does_not_cancel_siblings() {
    let harness = Harness::new();
    harness.store.add_user(A, &UserStatus::ProfileCollected).unwrap();
    harness.store.add_user(B, &UserStatus::ProfileCollected).unwrap();
    harness.browser.script(profile_url(A), PageScript::failing());
    script_feed(&harness, B, &[&["p1", "p2"]]);

    let report = harness
        .pipeline()
        .with_concurrency(2)
        .collect_posts(&harness.browser, 10)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(status_of(&harness, A), Some(UserStatus::ProfileCollected));
    assert_eq!(status_of(&harness, B), Some(UserStatus::PostsCollected));
    assert_eq!(harness.staging.read_posts(B).unwrap().len(), 2);
    assert!(harness.staging.read_posts(A).unwrap().is_empty());
}

/// Store that lists a fixed batch and fails updates with a fixed error
struct BrokenStore {
    batch: Vec<Did>,
    missing: bool,
}

impl StatusStore for BrokenStore {
    fn add_user(&self, _did: &str, _status: &UserStatus) -> Result<(), StorageError> {
        Ok(())
    }

    fn get_user_status(&self, _did: &str) -> Result<Option<UserStatus>, StorageError> {
        Ok(None)
    }

    fn update_user_status(&self, did: &str, _status: &UserStatus) -> Result<(), StorageError> {
        if self.missing {
            Err(StorageError::UserNotFound(did.to_string()))
        } else {
            Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk detached",
            )))
        }
    }

    fn list_by_status(&self, _status: &UserStatus, limit: usize) -> Result<Vec<Did>, StorageError> {
        Ok(self.batch.iter().take(limit).cloned().collect())
    }

    fn count_by_status(&self) -> Result<BTreeMap<String, usize>, StorageError> {
        Ok(BTreeMap::new())
    }
}

fn pipeline_over(harness: &Harness, store: BrokenStore) -> Pipeline {
    let extractors = skyhive::extract::Extractors::select(
        Strategy::Network,
        Strategy::Network,
        Strategy::Network,
        settings(),
        Default::default(),
        None,
    );
    Pipeline::new(Arc::new(store), harness.staging.clone(), extractors).with_concurrency(2)
}

#[tokio::test]
async fn test_store_failure_aborts_the_stage() {
    let harness = Harness::new();
    script_profile(&harness, A, "alice.test");
    script_profile(&harness, B, "bob.test");
    let pipeline = pipeline_over(
        &harness,
        BrokenStore {
            batch: vec![A.to_string(), B.to_string()],
            missing: false,
        },
    );

    let result = pipeline.collect_profiles(&harness.browser, 10).await;

    assert!(matches!(result, Err(ApiError::StorageError(_))));
    // Both units ran to completion before the error surfaced
    assert_eq!(harness.browser.pages_opened(), 2);
    assert_eq!(harness.browser.open_pages(), 0);
}

#[tokio::test]
async fn test_vanished_user_fails_only_its_unit() {
    let harness = Harness::new();
    script_profile(&harness, A, "alice.test");
    let pipeline = pipeline_over(
        &harness,
        BrokenStore {
            batch: vec![A.to_string()],
            missing: true,
        },
    );

    let report = pipeline
        .collect_profiles(&harness.browser, 10)
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.succeeded, 0);
}
