//! In-memory collaborators for testing
//!
//! Provides an in-memory story collection with a live change feed, a static
//! auth source, and a map-backed asset fetcher, so sync and favorites logic
//! can be exercised without a real backend.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storyscape_core::{InMemoryStorySource, OwnerId, RemoteStorySource, StoryRecord};
//!
//! let source = InMemoryStorySource::new();
//! let owner = OwnerId::new("alice");
//! source.insert(&StoryRecord::new("Title", "i", "m", "c").with_owner(owner.clone()));
//!
//! let mut feed = source.watch(&owner).await.unwrap();
//! let first = feed.next().await.unwrap().unwrap();
//! assert_eq!(first.len(), 1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::{FetchError, SourceError};
use crate::story::{OwnerId, RemoteDocument, StoryId, StoryRecord};
use crate::traits::{AssetFetcher, AuthSource, DocumentFeed, RemoteStorySource};

/// Signal pushed to every open feed
#[derive(Debug, Clone)]
enum FeedSignal {
    Changed,
    Failed(SourceError),
}

/// Decrements the open-feed counter when a feed is dropped
struct FeedGuard(Arc<AtomicUsize>);

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory story collection with a push change feed
///
/// Every mutation re-delivers the full, newest-first result set to each open
/// feed, mirroring a document store's snapshot listener.
pub struct InMemoryStorySource {
    documents: Arc<RwLock<Vec<RemoteDocument>>>,
    signals: broadcast::Sender<FeedSignal>,
    unavailable: AtomicBool,
    open_feeds: Arc<AtomicUsize>,
}

impl Default for InMemoryStorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorySource {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(64);
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
            signals,
            unavailable: AtomicBool::new(false),
            open_feeds: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Insert or replace a story and notify open feeds
    pub fn insert(&self, record: &StoryRecord) {
        match RemoteDocument::from_record(record) {
            Ok(document) => self.insert_raw(document.key, document.payload),
            Err(e) => trace!(error = %e, "Skipping unencodable record"),
        }
    }

    /// Insert an arbitrary payload, malformed or not
    pub fn insert_raw(&self, key: impl Into<String>, payload: serde_json::Value) {
        let document = RemoteDocument::new(key, payload);
        {
            let mut documents = self.documents.write();
            documents.retain(|d| d.key != document.key);
            documents.push(document);
        }
        self.notify(FeedSignal::Changed);
    }

    /// Remove a story without going through the trait
    pub fn remove(&self, id: &StoryId) -> bool {
        let removed = {
            let mut documents = self.documents.write();
            let before = documents.len();
            documents.retain(|d| d.key != id.as_str());
            documents.len() != before
        };
        if removed {
            self.notify(FeedSignal::Changed);
        }
        removed
    }

    /// Push an error to every open feed
    pub fn fail_feeds(&self, error: SourceError) {
        self.notify(FeedSignal::Failed(error));
    }

    /// Make requests fail with [`SourceError::Unavailable`]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn contains(&self, id: &StoryId) -> bool {
        self.documents.read().iter().any(|d| d.key == id.as_str())
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Number of feeds currently open
    pub fn open_feeds(&self) -> usize {
        self.open_feeds.load(Ordering::SeqCst)
    }

    fn notify(&self, signal: FeedSignal) {
        // No receivers just means no open feeds
        let _ = self.signals.send(signal);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(SourceError::unavailable("in-memory source offline"))
        } else {
            Ok(())
        }
    }
}

fn timestamp_of(document: &RemoteDocument) -> Option<DateTime<FixedOffset>> {
    document
        .payload
        .get("timestamp")
        .and_then(|t| t.as_str())
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
}

/// Owner's documents, newest first; undated documents sort last
fn snapshot(documents: &RwLock<Vec<RemoteDocument>>, owner: &OwnerId) -> Vec<RemoteDocument> {
    let mut owned: Vec<RemoteDocument> = documents
        .read()
        .iter()
        .filter(|d| d.payload.get("userId").and_then(|u| u.as_str()) == Some(owner.as_str()))
        .cloned()
        .collect();
    owned.sort_by(|a, b| timestamp_of(b).cmp(&timestamp_of(a)));
    owned
}

#[async_trait]
impl RemoteStorySource for InMemoryStorySource {
    async fn watch(&self, owner: &OwnerId) -> Result<DocumentFeed, SourceError> {
        self.check_available()?;

        let documents = Arc::clone(&self.documents);
        let owner = owner.clone();
        let mut rx = self.signals.subscribe();
        self.open_feeds.fetch_add(1, Ordering::SeqCst);
        let guard = FeedGuard(Arc::clone(&self.open_feeds));

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            yield Ok(snapshot(&documents, &owner));
            loop {
                match rx.recv().await {
                    Ok(FeedSignal::Changed) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        yield Ok(snapshot(&documents, &owner));
                    }
                    Ok(FeedSignal::Failed(e)) => yield Err(e),
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }

    async fn create(&self, record: &StoryRecord) -> Result<(), SourceError> {
        self.check_available()?;
        self.insert(record);
        Ok(())
    }

    async fn delete(&self, id: &StoryId) -> Result<(), SourceError> {
        self.check_available()?;
        self.remove(id);
        Ok(())
    }
}

/// Auth source with a settable owner
#[derive(Debug, Default)]
pub struct StaticAuth {
    owner: RwLock<Option<OwnerId>>,
}

impl StaticAuth {
    pub fn signed_in(owner: impl Into<OwnerId>) -> Self {
        Self {
            owner: RwLock::new(Some(owner.into())),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, owner: impl Into<OwnerId>) {
        *self.owner.write() = Some(owner.into());
    }

    pub fn sign_out(&self) {
        *self.owner.write() = None;
    }
}

impl AuthSource for StaticAuth {
    fn current_owner(&self) -> Option<OwnerId> {
        self.owner.read().clone()
    }
}

/// Map-backed asset fetcher
#[derive(Debug, Default)]
pub struct InMemoryAssetFetcher {
    assets: DashMap<String, Bytes>,
    delay: Option<Duration>,
    requests: AtomicUsize,
}

impl InMemoryAssetFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every fetch, to keep downloads in flight during a test
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_asset(self, uri: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(uri, data);
        self
    }

    pub fn insert(&self, uri: impl Into<String>, data: impl Into<Bytes>) {
        self.assets.insert(uri.into(), data.into());
    }

    /// Number of fetches attempted so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetFetcher for InMemoryAssetFetcher {
    async fn fetch(&self, uri: &str) -> Result<Bytes, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.assets
            .get(uri)
            .map(|data| data.value().clone())
            .ok_or_else(|| FetchError::NotFound(uri.to_string()))
    }
}
