//! Live subscription to the owner's remote story collection.
//!
//! [`RemoteStorySync`] owns at most one active subscription. Each subscription
//! runs a pump task that reads the remote feed, decodes every batch (dropping
//! malformed documents) and forwards the result as a [`SyncEvent`]. Starting a
//! new subscription aborts the previous pump, which drops the remote feed and
//! ends the superseded stream.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use storyscape_core::{
    AuthSource, DocumentFeed, OwnerId, RemoteStorySource, StoryId, StoryRecord, decode_documents,
};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::stream::{broadcast_to_stream, channel_to_stream};

/// One emission of a subscription
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// The complete current record set, newest first
    Snapshot(Vec<StoryRecord>),
    /// A recoverable feed error; the last snapshot stays valid
    Transient(LibraryError),
    /// The subscription was torn down
    Fatal(LibraryError),
}

impl SyncEvent {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncEvent::Fatal(_))
    }
}

/// Stream of events for one subscription
pub type SyncStream = Pin<Box<dyn Stream<Item = SyncEvent> + Send>>;

struct ActiveSubscription {
    id: u64,
    owner: OwnerId,
    pump: JoinHandle<()>,
}

/// Owner of the single active remote subscription
pub struct RemoteStorySync {
    source: Arc<dyn RemoteStorySource>,
    active: Arc<Mutex<Option<ActiveSubscription>>>,
    latest: Arc<RwLock<Option<Vec<StoryRecord>>>>,
    events: broadcast::Sender<SyncEvent>,
    capacity: usize,
    next_id: AtomicU64,
}

impl RemoteStorySync {
    pub fn new(source: Arc<dyn RemoteStorySource>) -> Self {
        Self::with_capacity(source, 256)
    }

    /// Create with a specific event channel capacity
    pub fn with_capacity(source: Arc<dyn RemoteStorySource>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (events, _) = broadcast::channel(capacity);
        Self {
            source,
            active: Arc::new(Mutex::new(None)),
            latest: Arc::new(RwLock::new(None)),
            events,
            capacity,
            next_id: AtomicU64::new(0),
        }
    }

    /// Subscribe to an owner's stories, superseding any active subscription.
    ///
    /// Fails if the remote feed cannot be opened. Once open, errors arrive on
    /// the stream: transient ones keep the subscription alive, a fatal one
    /// ends it.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn subscribe(&self, owner: &OwnerId) -> Result<SyncStream> {
        let feed = self.source.watch(owner).await.map_err(|e| {
            warn!(error = %e, "Failed to open remote feed");
            LibraryError::from(e)
        })?;

        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            debug!(previous_owner = %previous.owner, "Superseding subscription");
            previous.pump.abort();
        }
        *self.latest.write() = None;

        let pump = Pump {
            id,
            tx,
            events: self.events.clone(),
            active: Arc::clone(&self.active),
            latest: Arc::clone(&self.latest),
        };
        let span = info_span!("story_feed", owner = %owner, subscription = id);
        let handle = tokio::spawn(pump.run(feed).instrument(span));

        *active = Some(ActiveSubscription {
            id,
            owner: owner.clone(),
            pump: handle,
        });
        info!("Subscribed to remote stories");

        Ok(channel_to_stream(rx))
    }

    /// Subscribe for whoever is currently signed in
    pub async fn subscribe_current(&self, auth: &dyn AuthSource) -> Result<SyncStream> {
        let owner = auth
            .current_owner()
            .ok_or(LibraryError::NotAuthenticated)?;
        self.subscribe(&owner).await
    }

    /// Stop the active subscription; returns whether one was running
    pub fn unsubscribe(&self) -> bool {
        match self.active.lock().take() {
            Some(subscription) => {
                subscription.pump.abort();
                *self.latest.write() = None;
                info!(owner = %subscription.owner, "Unsubscribed from remote stories");
                true
            }
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Owner of the active subscription
    pub fn current_owner(&self) -> Option<OwnerId> {
        self.active.lock().as_ref().map(|a| a.owner.clone())
    }

    /// Last decoded record set of the active subscription
    pub fn latest_snapshot(&self) -> Option<Vec<StoryRecord>> {
        self.latest.read().clone()
    }

    /// Events of every subscription, for observers that did not start them
    pub fn events(&self) -> SyncStream {
        broadcast_to_stream(self.events.subscribe())
    }

    /// Create a story remotely
    #[instrument(skip(self, record), fields(story_id = %record.id.short()))]
    pub async fn create(&self, record: &StoryRecord) -> Result<()> {
        self.source.create(record).await?;
        debug!("Created remote story");
        Ok(())
    }

    /// Delete a story remotely
    #[instrument(skip(self), fields(story_id = %id.short()))]
    pub async fn delete(&self, id: &StoryId) -> Result<()> {
        self.source.delete(id).await?;
        debug!("Deleted remote story");
        Ok(())
    }
}

impl Drop for RemoteStorySync {
    fn drop(&mut self) {
        if let Some(subscription) = self.active.lock().take() {
            subscription.pump.abort();
        }
    }
}

/// Background task forwarding one remote feed
struct Pump {
    id: u64,
    tx: mpsc::Sender<SyncEvent>,
    events: broadcast::Sender<SyncEvent>,
    active: Arc<Mutex<Option<ActiveSubscription>>>,
    latest: Arc<RwLock<Option<Vec<StoryRecord>>>>,
}

impl Pump {
    async fn run(self, mut feed: DocumentFeed) {
        while let Some(item) = feed.next().await {
            let event = match item {
                Ok(documents) => {
                    let batch = decode_documents(&documents);
                    debug!(
                        records = batch.records.len(),
                        skipped = batch.skipped,
                        "Received snapshot"
                    );
                    SyncEvent::Snapshot(batch.records)
                }
                Err(e) if e.is_fatal() => {
                    warn!(error = %e, "Remote feed failed, ending subscription");
                    SyncEvent::Fatal(e.into())
                }
                Err(e) => {
                    warn!(error = %e, "Remote feed error");
                    SyncEvent::Transient(e.into())
                }
            };

            if !self.publish(&event) {
                debug!("Subscription superseded, dropping event");
                return;
            }
            let fatal = event.is_fatal();
            if self.tx.send(event).await.is_err() {
                debug!("Subscriber dropped its stream");
            }
            if fatal {
                break;
            }
        }

        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|a| a.id == self.id) {
            *active = None;
        }
        debug!("Subscription ended");
    }

    /// Record and broadcast an event while this pump is still the active
    /// subscription; returns false once it has been superseded
    fn publish(&self, event: &SyncEvent) -> bool {
        let active = self.active.lock();
        if !active.as_ref().is_some_and(|a| a.id == self.id) {
            return false;
        }
        if let SyncEvent::Snapshot(records) = event {
            *self.latest.write() = Some(records.clone());
        }
        // No observers is fine
        let _ = self.events.send(event.clone());
        true
    }
}
