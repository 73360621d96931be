//! End-to-end scenarios for the story library.
//!
//! Tests cover:
//! - Bucketed sections from a live subscription
//! - Malformed documents dropped without surfacing an error
//! - Search over the live view
//! - Favoriting with images, then deleting the story remotely
//! - Transient and fatal feed errors, retry, sign-out
//! - Publishing and switching owners

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::json;
use storyscape_core::{
    FixedClock, InMemoryAssetFetcher, InMemoryStorySource, SourceError, StaticAuth,
};
use storyscape_library::prelude::*;
use storyscape_storage::{FsBlobStore, InMemoryBlobStore};
use tempfile::TempDir;

struct Harness {
    library: Library,
    source: Arc<InMemoryStorySource>,
    auth: Arc<StaticAuth>,
    clock: Arc<FixedClock>,
}

fn noon() -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 4, 20, 12, 0, 0)
        .unwrap()
}

fn story(owner: &str, title: &str, created: DateTime<FixedOffset>) -> StoryRecord {
    StoryRecord::new(title, "intro", "middle", "end")
        .with_id(title)
        .with_owner(OwnerId::new(owner))
        .with_created_at(created.with_timezone(&Utc))
}

async fn harness() -> Harness {
    storyscape_logging::init_testing();
    let source = Arc::new(InMemoryStorySource::new());
    let auth = Arc::new(StaticAuth::signed_in("ada"));
    let clock = Arc::new(FixedClock::new(noon()));
    let fetcher = InMemoryAssetFetcher::new()
        .with_asset("https://img.example/x_intro.jpg", b"intro".to_vec())
        .with_asset("https://img.example/x_middle.jpg", b"middle".to_vec());

    let library = Library::builder()
        .auth(auth.clone())
        .source(source.clone())
        .fetcher(Arc::new(fetcher))
        .blob_store(Arc::new(InMemoryBlobStore::new()))
        .clock(clock.clone())
        .build()
        .await
        .unwrap();

    Harness {
        library,
        source,
        auth,
        clock,
    }
}

/// Poll until `check` holds
async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn labels(sections: &[Section]) -> Vec<String> {
    sections.iter().map(|s| s.label.clone()).collect()
}

// ============================================================
// Live view
// ============================================================

#[tokio::test]
async fn test_sections_from_live_subscription() {
    let h = harness().await;
    let now = noon();
    h.source.insert(&story("ada", "A", now - chrono::Duration::hours(1)));
    h.source.insert(&story("ada", "B", now - chrono::Duration::days(1)));
    h.source.insert(&story("ada", "C", now - chrono::Duration::days(3)));
    h.source.insert(&story(
        "ada",
        "D",
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 9, 0, 0)
            .unwrap(),
    ));
    h.source.insert(&story("someone-else", "E", now));

    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    assert_eq!(
        labels(&h.library.visible_sections()),
        vec!["Today", "Yesterday", "Last 7 Days", "March 2024"]
    );
    assert_eq!(h.library.records().len(), 4);
}

#[tokio::test]
async fn test_malformed_documents_are_dropped() {
    let h = harness().await;
    for i in 0..4 {
        h.source
            .insert(&story("ada", &format!("story-{i}"), noon() - chrono::Duration::hours(i)));
    }
    h.source
        .insert_raw("broken", json!({ "userId": "ada", "title": "missing body" }));

    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    assert_eq!(h.library.records().len(), 4);
    assert!(h.library.last_error().is_none());
}

#[tokio::test]
async fn test_search_filters_live_view() {
    let h = harness().await;
    h.source.insert(&story("ada", "The Dragon", noon()));
    h.source.insert(&story("ada", "Sea Song", noon() - chrono::Duration::days(2)));
    h.source.insert(&story("ada", "dragonfly", noon() - chrono::Duration::days(40)));

    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    h.library.set_search_text("DRAGON");
    let visible = h.library.visible_sections();
    assert_eq!(labels(&visible), vec!["Today", "March 2024"]);
    assert_eq!(visible.iter().map(Section::len).sum::<usize>(), 2);

    // New snapshots keep the search applied
    h.source.insert(&story("ada", "Dragon Egg", noon()));
    eventually(|| h.library.visible_sections()[0].len() == 2).await;

    h.library.set_search_text("");
    assert_eq!(h.library.visible_sections().len(), 3);
}

#[tokio::test]
async fn test_refresh_after_day_rollover() {
    let h = harness().await;
    h.source.insert(&story("ada", "A", noon() - chrono::Duration::hours(1)));

    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;
    assert_eq!(labels(&h.library.sections()), vec!["Today"]);

    h.clock.advance(chrono::Duration::days(1));
    h.library.refresh();
    assert_eq!(labels(&h.library.sections()), vec!["Yesterday"]);
}

#[tokio::test]
async fn test_updates_announce_state_changes() {
    let h = harness().await;
    let mut updates = h.library.updates();

    h.library.start().await.unwrap();
    assert_eq!(updates.next().await, Some(LoadState::Loading));
    assert_eq!(updates.next().await, Some(LoadState::Ready));
}

// ============================================================
// Errors and lifecycle
// ============================================================

#[tokio::test]
async fn test_transient_error_keeps_data() {
    let h = harness().await;
    h.source.insert(&story("ada", "A", noon()));
    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    h.source.fail_feeds(SourceError::unavailable("connection reset"));
    eventually(|| h.library.last_error().is_some()).await;

    assert_eq!(h.library.state(), LoadState::Ready);
    assert_eq!(h.library.records().len(), 1);
    assert!(h.library.is_running());
}

#[tokio::test]
async fn test_fatal_error_then_retry() {
    let h = harness().await;
    h.source.insert(&story("ada", "A", noon()));
    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    h.source.fail_feeds(SourceError::unauthorized("token revoked"));
    eventually(|| h.library.state() == LoadState::Error).await;

    // Last good sections stay visible
    assert_eq!(h.library.visible_sections().len(), 1);
    assert!(h.library.last_error().is_some_and(|e| e.is_fatal()));
    eventually(|| h.source.open_feeds() == 0).await;

    assert!(h.library.retry().await.unwrap());
    eventually(|| h.library.state() == LoadState::Ready).await;
    assert!(h.library.last_error().is_none());
    assert_eq!(h.source.open_feeds(), 1);
}

#[tokio::test]
async fn test_unreachable_source_then_retry() {
    let h = harness().await;
    h.source.set_unavailable(true);

    assert!(h.library.start().await.is_err());
    assert_eq!(h.library.state(), LoadState::Error);

    h.source.set_unavailable(false);
    assert!(h.library.retry().await.unwrap());
    eventually(|| h.library.state() == LoadState::Ready).await;
}

#[tokio::test]
async fn test_sign_out_returns_to_idle() {
    let h = harness().await;
    h.source.insert(&story("ada", "A", noon()));
    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    h.library.sign_out();
    assert_eq!(h.library.state(), LoadState::Idle);
    assert!(h.library.records().is_empty());
    assert!(!h.library.is_running());
    eventually(|| h.source.open_feeds() == 0).await;
}

#[tokio::test]
async fn test_switching_owner_supersedes_subscription() {
    let h = harness().await;
    h.source.insert(&story("ada", "Ada's", noon()));
    h.source.insert(&story("bob", "Bob's", noon()));

    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;

    h.auth.sign_in("bob");
    h.library.start().await.unwrap();
    eventually(|| {
        h.library
            .records()
            .first()
            .is_some_and(|r| r.title == "Bob's")
    })
    .await;

    assert_eq!(h.library.records().len(), 1);
    eventually(|| h.source.open_feeds() == 1).await;
}

#[tokio::test]
async fn test_publish_appears_in_view() {
    let h = harness().await;
    h.library.start().await.unwrap();
    eventually(|| h.library.state() == LoadState::Ready).await;
    assert!(h.library.records().is_empty());

    let published = h
        .library
        .publish(StoryRecord::new("Fresh", "i", "m", "c").with_created_at(noon().with_timezone(&Utc)))
        .await
        .unwrap();

    eventually(|| h.library.records().len() == 1).await;
    assert_eq!(h.library.records()[0].id, published.id);
}

// ============================================================
// Favorites
// ============================================================

#[tokio::test]
async fn test_favorite_then_delete_remotely() {
    let temp = TempDir::new().unwrap();
    let source = Arc::new(InMemoryStorySource::new());
    let fetcher = InMemoryAssetFetcher::new()
        .with_asset("https://img.example/x_intro.jpg", b"intro".to_vec())
        .with_asset("https://img.example/x_middle.jpg", b"middle".to_vec());
    let blobs = FsBlobStore::open(temp.path()).await.unwrap();

    let library = Library::builder()
        .auth(Arc::new(StaticAuth::signed_in("ada")))
        .source(source.clone())
        .fetcher(Arc::new(fetcher))
        .blob_store(Arc::new(blobs))
        .clock(Arc::new(FixedClock::new(noon())))
        .build()
        .await
        .unwrap();

    let x = story("ada", "X", noon())
        .with_image(AssetSlot::Intro, "https://img.example/x_intro.jpg")
        .with_image(AssetSlot::Middle, "https://img.example/x_middle.jpg");
    source.insert(&x);

    library.start().await.unwrap();
    eventually(|| library.records().len() == 1).await;

    let ToggleOutcome::Added(handle) = library.toggle_favorite(&x).await.unwrap() else {
        panic!("expected X to become a favorite");
    };
    let outcomes = handle.wait().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, o)| *o == AssetOutcome::Stored));
    assert!(temp.path().join("X_intro.jpg").exists());
    assert!(temp.path().join("X_middle.jpg").exists());

    library.delete_story(&x.id).await.unwrap();

    assert!(!library.is_favorite(&x.id));
    assert!(!temp.path().join("X.json").exists());
    assert!(!temp.path().join("X_intro.jpg").exists());
    assert!(!temp.path().join("X_middle.jpg").exists());
    eventually(|| library.records().is_empty()).await;
}

#[tokio::test]
async fn test_favorites_survive_restart() {
    let temp = TempDir::new().unwrap();
    let x = story("ada", "X", noon());

    {
        let library = Library::builder()
            .data_dir(temp.path())
            .auth(Arc::new(StaticAuth::signed_in("ada")))
            .source(Arc::new(InMemoryStorySource::new()))
            .fetcher(Arc::new(InMemoryAssetFetcher::new()))
            .build()
            .await
            .unwrap();
        library.toggle_favorite(&x).await.unwrap();
    }

    let library = Library::builder()
        .data_dir(temp.path())
        .auth(Arc::new(StaticAuth::signed_out()))
        .source(Arc::new(InMemoryStorySource::new()))
        .fetcher(Arc::new(InMemoryAssetFetcher::new()))
        .build()
        .await
        .unwrap();

    assert!(library.is_favorite(&x.id));
    let favorites = library.favorites().favorites().await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].title, "X");
}
