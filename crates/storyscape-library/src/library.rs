//! The story library facade.
//!
//! [`Library`] wires the remote subscription, the derived view and the
//! favorites coordinator together. A driver task folds subscription events
//! into the view and announces every change on [`Library::updates`].

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use storyscape_core::{
    AssetFetcher, AuthSource, Clock, Section, StoryId, StoryRecord, SystemClock,
};
use storyscape_storage::{BlobStore, FsBlobStore, LocalFavoritesStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::config::{LibraryBuilder, LibraryConfig, Preset};
use crate::error::{LibraryError, Result};
use crate::favorites::{FavoritesCoordinator, ToggleOutcome};
use crate::http::HttpAssetFetcher;
use crate::stream::broadcast_to_stream;
use crate::sync::{RemoteStorySync, SyncStream};
use crate::view::{LibraryViewState, LoadState};

/// The signed-in owner's live story library plus their offline favorites.
///
/// # Example
///
/// ```ignore
/// let library = Library::builder()
///     .auth(auth)
///     .source(source)
///     .build()
///     .await?;
///
/// library.start().await?;
/// for section in library.visible_sections() {
///     println!("{} ({})", section.label, section.len());
/// }
/// ```
pub struct Library {
    config: LibraryConfig,
    auth: Arc<dyn AuthSource>,
    sync: Arc<RemoteStorySync>,
    favorites: Arc<FavoritesCoordinator>,
    view: Arc<RwLock<LibraryViewState>>,
    updates: broadcast::Sender<LoadState>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Library {
    /// Create a builder for custom configuration.
    pub fn builder() -> LibraryBuilder {
        LibraryBuilder::new()
    }

    /// Create a builder starting from a preset.
    pub fn preset(preset: Preset) -> LibraryBuilder {
        LibraryBuilder::with_preset(preset)
    }

    /// Assemble a library from already-built parts.
    pub fn with_components(
        config: LibraryConfig,
        auth: Arc<dyn AuthSource>,
        sync: Arc<RemoteStorySync>,
        favorites: Arc<FavoritesCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (updates, _) = broadcast::channel(config.event_channel_capacity());
        Self {
            config,
            auth,
            sync,
            favorites,
            view: Arc::new(RwLock::new(LibraryViewState::new(clock))),
            updates,
            driver: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    pub fn sync(&self) -> &Arc<RemoteStorySync> {
        &self.sync
    }

    /// The process-wide favorites coordinator
    pub fn favorites(&self) -> &Arc<FavoritesCoordinator> {
        &self.favorites
    }

    // ============================================================
    // Subscription lifecycle
    // ============================================================

    /// Subscribe to the signed-in owner's stories.
    ///
    /// Calling this again restarts the subscription. If the remote feed
    /// cannot be opened the view moves to `Error` and the error is returned.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let Some(owner) = self.auth.current_owner() else {
            // A signed-out retry must not leave the view stuck in `Loading`
            if self.state() != LoadState::Idle {
                self.update_view(|view| view.fail(LibraryError::NotAuthenticated));
            }
            return Err(LibraryError::NotAuthenticated);
        };

        self.stop_driver();
        self.update_view(|view| view.start_loading());

        let stream = match self.sync.subscribe(&owner).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Could not start library subscription");
                self.update_view(|view| view.fail(e.clone()));
                return Err(e);
            }
        };

        let span = info_span!("library_driver", owner = %owner);
        let handle = tokio::spawn(
            drive(stream, Arc::clone(&self.view), self.updates.clone()).instrument(span),
        );
        if let Some(previous) = self.driver.lock().replace(handle) {
            previous.abort();
        }
        info!(owner = %owner, "Library started");
        Ok(())
    }

    /// Restart after a fatal error; returns false when not in `Error`
    pub async fn retry(&self) -> Result<bool> {
        let retrying = self.view.write().retry();
        if !retrying {
            return Ok(false);
        }
        debug!("Retrying library subscription");
        self.start().await.map(|_| true)
    }

    /// Stop the subscription and drop everything derived from it
    pub fn sign_out(&self) {
        self.stop_driver();
        self.sync.unsubscribe();
        self.update_view(|view| view.reset());
        info!("Library signed out");
    }

    /// Whether a subscription is running
    pub fn is_running(&self) -> bool {
        self.sync.is_subscribed()
    }

    /// View state after every change
    pub fn updates(&self) -> Pin<Box<dyn Stream<Item = LoadState> + Send>> {
        broadcast_to_stream(self.updates.subscribe())
    }

    // ============================================================
    // View
    // ============================================================

    pub fn state(&self) -> LoadState {
        self.view.read().state()
    }

    pub fn last_error(&self) -> Option<LibraryError> {
        self.view.read().last_error().cloned()
    }

    pub fn records(&self) -> Vec<StoryRecord> {
        self.view.read().records().to_vec()
    }

    /// Every section, ignoring the search text
    pub fn sections(&self) -> Vec<Section> {
        self.view.read().sections().to_vec()
    }

    /// Sections filtered by the current search text
    pub fn visible_sections(&self) -> Vec<Section> {
        self.view.read().visible_sections().to_vec()
    }

    pub fn search_text(&self) -> String {
        self.view.read().search_text().to_string()
    }

    pub fn set_search_text(&self, text: impl Into<String>) {
        let text = text.into();
        self.update_view(|view| view.set_search_text(text));
    }

    /// Re-bucket against the clock, e.g. after the day rolls over
    pub fn refresh(&self) {
        self.update_view(|view| view.refresh());
    }

    // ============================================================
    // Stories and favorites
    // ============================================================

    /// Create a story under the signed-in owner; returns the stored record
    #[instrument(skip(self, record), fields(story_id = %record.id.short()))]
    pub async fn publish(&self, record: StoryRecord) -> Result<StoryRecord> {
        let owner = self
            .auth
            .current_owner()
            .ok_or(LibraryError::NotAuthenticated)?;
        let record = record.with_owner(owner);
        self.sync.create(&record).await?;
        Ok(record)
    }

    pub fn is_favorite(&self, id: &StoryId) -> bool {
        self.favorites.is_favorite(id)
    }

    pub async fn toggle_favorite(&self, record: &StoryRecord) -> Result<ToggleOutcome> {
        self.favorites.toggle_favorite(record).await
    }

    /// Delete a story remotely, then drop its favorite
    pub async fn delete_story(&self, id: &StoryId) -> Result<()> {
        self.favorites.delete_story(&self.sync, id).await
    }

    fn update_view(&self, f: impl FnOnce(&mut LibraryViewState)) {
        let state = {
            let mut view = self.view.write();
            f(&mut view);
            view.state()
        };
        // No observers is fine
        let _ = self.updates.send(state);
    }

    fn stop_driver(&self) {
        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.stop_driver();
    }
}

/// Fold subscription events into the view until the stream ends
async fn drive(
    mut stream: SyncStream,
    view: Arc<RwLock<LibraryViewState>>,
    updates: broadcast::Sender<LoadState>,
) {
    while let Some(event) = stream.next().await {
        let state = {
            let mut view = view.write();
            view.apply(event);
            view.state()
        };
        let _ = updates.send(state);
    }
    debug!("Library driver finished");
}

impl LibraryBuilder {
    /// Build the library.
    ///
    /// Fails if the auth source or remote source is missing, or if the
    /// favorites directory cannot be opened.
    pub async fn build(self) -> Result<Library> {
        let auth = self
            .auth
            .ok_or_else(|| LibraryError::Config("an auth source is required".into()))?;
        let source = self
            .source
            .ok_or_else(|| LibraryError::Config("a remote story source is required".into()))?;

        let fetcher: Arc<dyn AssetFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpAssetFetcher::new(self.config.fetch_timeout())?),
        };
        let blobs: Arc<dyn BlobStore> = match self.blobs {
            Some(blobs) => blobs,
            None => Arc::new(FsBlobStore::new(self.config.blob_store_config()).await?),
        };
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let store = Arc::new(LocalFavoritesStore::new(blobs, fetcher));
        let favorites = Arc::new(FavoritesCoordinator::load(store).await?);
        let sync = Arc::new(RemoteStorySync::with_capacity(
            source,
            self.config.event_channel_capacity(),
        ));

        Ok(Library::with_components(
            self.config,
            auth,
            sync,
            favorites,
            clock,
        ))
    }
}
