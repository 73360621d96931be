//! Durable favorites cache
//!
//! A favorite is a story snapshot persisted as `{id}.json` plus up to two
//! cached images, `{id}_intro.jpg` and `{id}_middle.jpg`. Metadata is written
//! synchronously by [`LocalFavoritesStore::save`]; images are downloaded and
//! written in the background, each reporting through its own completion
//! signal on the returned [`SaveHandle`].
//!
//! Metadata and image writes are not atomic with each other. Readers must
//! tolerate a favorite whose images are missing.
//!
//! ## Late downloads
//!
//! Every save stamps the id with a fresh generation. A background write only
//! lands if the id still carries the generation it was started under; if a
//! [`remove`](LocalFavoritesStore::remove) slips in between the check and the
//! write, the write is undone afterwards. A download that finishes after its
//! favorite was removed therefore never resurrects an image file.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use storyscape_core::{AssetFetcher, AssetSlot, StoryId, StoryRecord};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::blobs::{BlobStore, FsBlobStore, InMemoryBlobStore};
use crate::error::StorageError;

const METADATA_SUFFIX: &str = ".json";
const ASSET_SUFFIX: &str = ".jpg";

/// How a background asset write ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    /// The asset was fetched and written
    Stored,
    /// The fetch or the write failed; the favorite has no image for this slot
    Failed,
    /// The favorite was removed or re-saved before the asset landed
    Stale,
}

/// Completion signals for the assets of one save
#[derive(Debug)]
pub struct SaveHandle {
    id: StoryId,
    pending: Vec<(AssetSlot, oneshot::Receiver<AssetOutcome>)>,
}

impl SaveHandle {
    pub fn id(&self) -> &StoryId {
        &self.id
    }

    /// Slots with a download in flight
    pub fn slots(&self) -> Vec<AssetSlot> {
        self.pending.iter().map(|(slot, _)| *slot).collect()
    }

    /// Wait for every asset of this save to settle
    pub async fn wait(self) -> Vec<(AssetSlot, AssetOutcome)> {
        join_all(self.pending.into_iter().map(|(slot, rx)| async move {
            // A dropped sender means the task died before reporting
            (slot, rx.await.unwrap_or(AssetOutcome::Failed))
        }))
        .await
    }
}

/// Persisted favorites with cached images
pub struct LocalFavoritesStore {
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn AssetFetcher>,
    /// Save generation per wanted id
    generations: Arc<DashMap<StoryId, u64>>,
    next_generation: AtomicU64,
}

impl LocalFavoritesStore {
    pub fn new(blobs: Arc<dyn BlobStore>, fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self {
            blobs,
            fetcher,
            generations: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Open a store backed by a directory
    pub async fn open(
        dir: impl Into<PathBuf>,
        fetcher: Arc<dyn AssetFetcher>,
    ) -> Result<Self, StorageError> {
        let blobs = FsBlobStore::open(dir).await?;
        Ok(Self::new(Arc::new(blobs), fetcher))
    }

    /// Store that keeps everything in memory
    pub fn in_memory(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self::new(Arc::new(InMemoryBlobStore::new()), fetcher)
    }

    /// Blob name of a favorite's metadata
    pub fn metadata_name(id: &StoryId) -> String {
        format!("{id}{METADATA_SUFFIX}")
    }

    /// Persist a story snapshot and start downloading its images.
    ///
    /// Fails only if the metadata cannot be written. Image failures are
    /// logged and reported through the handle.
    #[instrument(skip(self, record), fields(story_id = %record.id.short()))]
    pub async fn save(&self, record: &StoryRecord) -> Result<SaveHandle, StorageError> {
        let id = record.id.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.generations.insert(id.clone(), generation);

        let written = match record.to_json_bytes() {
            Ok(json) => {
                self.blobs
                    .write(&Self::metadata_name(&id), Bytes::from(json))
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            self.generations.remove_if(&id, |_, g| *g == generation);
            warn!(error = %e, "Failed to persist favorite");
            return Err(e);
        }

        let mut pending = Vec::new();
        for (slot, uri) in record.asset_refs() {
            let (tx, rx) = oneshot::channel();
            let job = AssetJob {
                blobs: Arc::clone(&self.blobs),
                fetcher: Arc::clone(&self.fetcher),
                generations: Arc::clone(&self.generations),
                id: id.clone(),
                slot,
                uri: uri.to_string(),
                generation,
            };
            tokio::spawn(async move {
                let outcome = job.run().await;
                let _ = tx.send(outcome);
            });
            pending.push((slot, rx));
        }

        info!(assets = pending.len(), "Saved favorite");
        Ok(SaveHandle { id, pending })
    }

    /// Delete a favorite's metadata and both image slots.
    ///
    /// Idempotent: returns `Ok(false)` when nothing was stored. In-flight
    /// downloads for the id are discarded when they complete.
    #[instrument(skip(self), fields(story_id = %id.short()))]
    pub async fn remove(&self, id: &StoryId) -> Result<bool, StorageError> {
        self.generations.remove(id);

        let mut names = vec![Self::metadata_name(id)];
        names.extend(AssetSlot::ALL.iter().map(|slot| slot.blob_name(id)));

        let mut removed = false;
        let mut failure = None;
        for name in names {
            match self.blobs.delete(&name).await {
                Ok(deleted) => removed |= deleted,
                Err(e) => {
                    warn!(name, error = %e, "Failed to delete favorite file");
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if removed {
            debug!("Removed favorite");
        }
        Ok(removed)
    }

    /// All readable favorites, newest first. Corrupt entries are skipped.
    pub async fn list(&self) -> Result<Vec<StoryRecord>, StorageError> {
        let mut records = Vec::new();

        for name in self.blobs.list().await? {
            if !name.ends_with(METADATA_SUFFIX) {
                continue;
            }
            match self.read_entry(&name).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(name, error = %e, "Skipping unreadable favorite"),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Ids with persisted metadata, without decoding them
    pub async fn ids(&self) -> Result<Vec<StoryId>, StorageError> {
        Ok(self
            .blobs
            .list()
            .await?
            .into_iter()
            .filter_map(|name| {
                name.strip_suffix(METADATA_SUFFIX)
                    .filter(|stem| !stem.is_empty())
                    .map(StoryId::new)
            })
            .collect())
    }

    pub async fn get(&self, id: &StoryId) -> Result<Option<StoryRecord>, StorageError> {
        self.read_entry(&Self::metadata_name(id)).await
    }

    pub async fn contains(&self, id: &StoryId) -> Result<bool, StorageError> {
        self.blobs.exists(&Self::metadata_name(id)).await
    }

    /// Cached image for a slot; `None` means show no image
    pub async fn load_asset(
        &self,
        id: &StoryId,
        slot: AssetSlot,
    ) -> Result<Option<Bytes>, StorageError> {
        self.blobs.read(&slot.blob_name(id)).await
    }

    /// Delete every favorite and cached image. Returns the number of
    /// favorites removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize, StorageError> {
        self.generations.clear();

        let mut cleared = 0;
        for name in self.blobs.list().await? {
            let is_metadata = name.ends_with(METADATA_SUFFIX);
            if !is_metadata && !name.ends_with(ASSET_SUFFIX) {
                continue;
            }
            if self.blobs.delete(&name).await? && is_metadata {
                cleared += 1;
            }
        }

        info!(cleared, "Cleared favorites");
        Ok(cleared)
    }

    async fn read_entry(&self, name: &str) -> Result<Option<StoryRecord>, StorageError> {
        match self.blobs.read(name).await? {
            Some(data) => Ok(Some(StoryRecord::from_json_slice(&data)?)),
            None => Ok(None),
        }
    }
}

/// One background image download
struct AssetJob {
    blobs: Arc<dyn BlobStore>,
    fetcher: Arc<dyn AssetFetcher>,
    generations: Arc<DashMap<StoryId, u64>>,
    id: StoryId,
    slot: AssetSlot,
    uri: String,
    generation: u64,
}

impl AssetJob {
    fn is_current(&self) -> bool {
        self.generations
            .get(&self.id)
            .is_some_and(|g| *g == self.generation)
    }

    #[instrument(skip(self), fields(story_id = %self.id.short(), slot = %self.slot))]
    async fn run(self) -> AssetOutcome {
        let data = match self.fetcher.fetch(&self.uri).await {
            Ok(data) => data,
            Err(e) => {
                warn!(uri = %self.uri, error = %e, "Asset download failed");
                return AssetOutcome::Failed;
            }
        };

        if !self.is_current() {
            debug!("Discarding asset for removed favorite");
            return AssetOutcome::Stale;
        }

        let name = self.slot.blob_name(&self.id);
        if let Err(e) = self.blobs.write(&name, data).await {
            warn!(error = %e, "Asset write failed");
            return AssetOutcome::Failed;
        }

        if !self.is_current() {
            // A newer save owns the file; only undo when nobody wants the id
            if !self.generations.contains_key(&self.id)
                && let Err(e) = self.blobs.delete(&name).await
            {
                warn!(error = %e, "Failed to undo late asset write");
            }
            debug!("Asset write raced a removal");
            return AssetOutcome::Stale;
        }

        debug!("Cached asset");
        AssetOutcome::Stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use storyscape_core::InMemoryAssetFetcher;

    const INTRO_URI: &str = "mem://intro.jpg";
    const MIDDLE_URI: &str = "mem://middle.jpg";

    fn fetcher() -> InMemoryAssetFetcher {
        InMemoryAssetFetcher::new()
            .with_asset(INTRO_URI, b"intro-bytes".to_vec())
            .with_asset(MIDDLE_URI, b"middle-bytes".to_vec())
    }

    fn illustrated(id: &str) -> StoryRecord {
        StoryRecord::new(format!("Story {id}"), "i", "m", "c")
            .with_id(id)
            .with_image(AssetSlot::Intro, INTRO_URI)
            .with_image(AssetSlot::Middle, MIDDLE_URI)
    }

    fn create_test_store(fetcher: InMemoryAssetFetcher) -> (LocalFavoritesStore, Arc<InMemoryBlobStore>) {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = LocalFavoritesStore::new(blobs.clone(), Arc::new(fetcher));
        (store, blobs)
    }

    #[tokio::test]
    async fn test_save_stores_metadata_and_assets() {
        let (store, blobs) = create_test_store(fetcher());

        let handle = store.save(&illustrated("S1")).await.unwrap();
        assert_eq!(handle.slots(), vec![AssetSlot::Intro, AssetSlot::Middle]);

        let outcomes = handle.wait().await;
        assert!(outcomes.iter().all(|(_, o)| *o == AssetOutcome::Stored));
        assert_eq!(blobs.len(), 3);

        let id = StoryId::new("S1");
        assert!(store.contains(&id).await.unwrap());
        let intro = store.load_asset(&id, AssetSlot::Intro).await.unwrap().unwrap();
        assert_eq!(&intro[..], b"intro-bytes");
        assert_eq!(store.get(&id).await.unwrap().unwrap().title, "Story S1");
    }

    #[tokio::test]
    async fn test_failed_download_does_not_fail_save() {
        let fetcher = InMemoryAssetFetcher::new().with_asset(INTRO_URI, b"ok".to_vec());
        let (store, _) = create_test_store(fetcher);

        let record = illustrated("S2").with_image(AssetSlot::Middle, "mem://missing.jpg");
        let outcomes = store.save(&record).await.unwrap().wait().await;
        assert_eq!(
            outcomes,
            vec![
                (AssetSlot::Intro, AssetOutcome::Stored),
                (AssetSlot::Middle, AssetOutcome::Failed)
            ]
        );

        let id = StoryId::new("S2");
        assert!(store.contains(&id).await.unwrap());
        assert!(store.load_asset(&id, AssetSlot::Middle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_without_images_has_no_pending_slots() {
        let (store, blobs) = create_test_store(fetcher());
        let record = StoryRecord::new("plain", "i", "m", "c");
        let handle = store.save(&record).await.unwrap();
        assert!(handle.slots().is_empty());
        assert!(handle.wait().await.is_empty());
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, blobs) = create_test_store(fetcher());

        assert!(!store.remove(&StoryId::new("never")).await.unwrap());

        store.save(&illustrated("S3")).await.unwrap().wait().await;
        assert!(store.remove(&StoryId::new("S3")).await.unwrap());
        assert!(!store.remove(&StoryId::new("S3")).await.unwrap());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_download_completing_after_remove_is_discarded() {
        let (store, blobs) = create_test_store(fetcher().with_delay(Duration::from_millis(50)));

        let handle = store.save(&illustrated("S4")).await.unwrap();
        store.remove(&StoryId::new("S4")).await.unwrap();

        let outcomes = handle.wait().await;
        assert!(outcomes.iter().all(|(_, o)| *o == AssetOutcome::Stale));
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn test_resave_supersedes_in_flight_download() {
        let (store, blobs) = create_test_store(fetcher().with_delay(Duration::from_millis(30)));
        let record = illustrated("S5");

        let first = store.save(&record).await.unwrap();
        let second = store.save(&record).await.unwrap();

        assert!(first.wait().await.iter().all(|(_, o)| *o == AssetOutcome::Stale));
        assert!(second.wait().await.iter().all(|(_, o)| *o == AssetOutcome::Stored));
        assert_eq!(blobs.len(), 3);
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_entries_and_sorts_newest_first() {
        let (store, blobs) = create_test_store(fetcher());
        let older = StoryRecord::new("older", "i", "m", "c")
            .with_created_at(chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let newer = StoryRecord::new("newer", "i", "m", "c")
            .with_created_at(chrono::DateTime::from_timestamp(1_710_000_000, 0).unwrap());
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        blobs
            .write("broken.json", Bytes::from_static(b"{ not json"))
            .await
            .unwrap();

        let titles: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["newer", "older"]);
        assert_eq!(store.ids().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_clear_removes_json_and_images_only() {
        let (store, blobs) = create_test_store(fetcher());
        store.save(&illustrated("A")).await.unwrap().wait().await;
        store.save(&illustrated("B")).await.unwrap().wait().await;
        blobs
            .write("settings.plist", Bytes::from_static(b"keep"))
            .await
            .unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(blobs.list().await.unwrap(), vec!["settings.plist".to_string()]);
        assert!(store.list().await.unwrap().is_empty());
    }
}
