//! Favorite toggles and deletion reconciliation.
//!
//! [`FavoritesCoordinator`] keeps an in-memory set of favorited ids for O(1)
//! lookups and drives [`LocalFavoritesStore`] on every toggle. Toggles for the
//! same id are serialized: a second toggle waits for the first to finish and
//! then applies on top of it. Clearing excludes every toggle and removal, so
//! the set and storage agree once it returns.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use storyscape_core::{StoryId, StoryRecord, title_matches};
use storyscape_storage::{LocalFavoritesStore, SaveHandle};
use tokio::sync::{Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tracing::{info, instrument};

use crate::error::Result;
use crate::sync::RemoteStorySync;

/// What a toggle did
#[derive(Debug)]
pub enum ToggleOutcome {
    /// The story is now a favorite; images settle through the handle
    Added(SaveHandle),
    Removed,
}

impl ToggleOutcome {
    pub fn is_favorite(&self) -> bool {
        matches!(self, ToggleOutcome::Added(_))
    }
}

/// Process-wide favorites state, shared via `Arc`
pub struct FavoritesCoordinator {
    store: Arc<LocalFavoritesStore>,
    ids: RwLock<HashSet<StoryId>>,
    locks: DashMap<StoryId, Arc<AsyncMutex<()>>>,
    /// Shared by per-id operations, exclusive for clear
    gate: AsyncRwLock<()>,
}

impl FavoritesCoordinator {
    /// Load the favorited ids from the store.
    ///
    /// Only entries that decode count; a corrupt file is neither listed nor
    /// reported as a favorite.
    pub async fn load(store: Arc<LocalFavoritesStore>) -> Result<Self> {
        let ids: HashSet<StoryId> = store
            .list()
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        info!(favorites = ids.len(), "Loaded favorites");
        Ok(Self {
            store,
            ids: RwLock::new(ids),
            locks: DashMap::new(),
            gate: AsyncRwLock::new(()),
        })
    }

    pub fn store(&self) -> &Arc<LocalFavoritesStore> {
        &self.store
    }

    pub fn is_favorite(&self, id: &StoryId) -> bool {
        self.ids.read().contains(id)
    }

    pub fn favorite_count(&self) -> usize {
        self.ids.read().len()
    }

    pub fn favorite_ids(&self) -> Vec<StoryId> {
        self.ids.read().iter().cloned().collect()
    }

    /// Favorite the story, or unfavorite it if it already is one.
    ///
    /// If persisting fails the in-memory set is restored to match storage.
    #[instrument(skip(self, record), fields(story_id = %record.id.short()))]
    pub async fn toggle_favorite(&self, record: &StoryRecord) -> Result<ToggleOutcome> {
        let id = &record.id;
        let _shared = self.gate.read().await;
        let lock = self.lock_for(id);
        let outcome = {
            let _guard = lock.lock().await;
            if self.is_favorite(id) {
                self.unfavorite(id).await.map(|_| ToggleOutcome::Removed)
            } else {
                self.favorite(record).await.map(ToggleOutcome::Added)
            }
        };
        drop(lock);
        self.release_lock(id);
        outcome
    }

    /// Unfavorite a story by id; returns whether it was a favorite
    #[instrument(skip(self), fields(story_id = %id.short()))]
    pub async fn remove_favorite(&self, id: &StoryId) -> Result<bool> {
        let _shared = self.gate.read().await;
        let lock = self.lock_for(id);
        let removed = {
            let _guard = lock.lock().await;
            if self.is_favorite(id) {
                self.unfavorite(id).await.map(|_| true)
            } else {
                Ok(false)
            }
        };
        drop(lock);
        self.release_lock(id);
        removed
    }

    /// Delete a story remotely, then drop its favorite.
    ///
    /// Nothing local changes if the remote delete fails. If the process dies
    /// between the two steps the favorite survives as independent data.
    #[instrument(skip(self, sync), fields(story_id = %id.short()))]
    pub async fn delete_story(&self, sync: &RemoteStorySync, id: &StoryId) -> Result<()> {
        sync.delete(id).await?;
        if self.is_favorite(id) {
            self.remove_favorite(id).await?;
        }
        Ok(())
    }

    /// Remove every favorite and cached image.
    ///
    /// Waits for in-flight toggles to finish and holds new ones back until
    /// storage is empty.
    #[instrument(skip(self))]
    pub async fn clear_favorites(&self) -> Result<usize> {
        let _exclusive = self.gate.write().await;
        self.ids.write().clear();
        Ok(self.store.clear().await?)
    }

    /// Persisted favorites, newest first
    pub async fn favorites(&self) -> Result<Vec<StoryRecord>> {
        Ok(self.store.list().await?)
    }

    /// Favorites whose title contains `query`, case-insensitively
    pub async fn search_favorites(&self, query: &str) -> Result<Vec<StoryRecord>> {
        let mut favorites = self.favorites().await?;
        favorites.retain(|record| title_matches(&record.title, query));
        Ok(favorites)
    }

    async fn favorite(&self, record: &StoryRecord) -> Result<SaveHandle> {
        self.ids.write().insert(record.id.clone());
        match self.store.save(record).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.ids.write().remove(&record.id);
                Err(e.into())
            }
        }
    }

    async fn unfavorite(&self, id: &StoryId) -> Result<()> {
        self.ids.write().remove(id);
        if let Err(e) = self.store.remove(id).await {
            self.ids.write().insert(id.clone());
            return Err(e.into());
        }
        Ok(())
    }

    fn lock_for(&self, id: &StoryId) -> Arc<AsyncMutex<()>> {
        Arc::clone(self.locks.entry(id.clone()).or_default().value())
    }

    fn release_lock(&self, id: &StoryId) {
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
