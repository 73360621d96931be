//! # StoryScape Storage
//!
//! Durable, offline-available storage for favorited stories.
//!
//! ## Features
//!
//! - **BlobStore trait**: Flat namespace of named byte blobs
//! - **FsBlobStore**: Directory-backed store with atomic writes
//! - **InMemoryBlobStore**: In-memory store for testing
//! - **LocalFavoritesStore**: Story snapshots plus background-cached images
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storyscape_core::{InMemoryAssetFetcher, StoryRecord};
//! use storyscape_storage::LocalFavoritesStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = LocalFavoritesStore::open("./favorites", Arc::new(InMemoryAssetFetcher::new()))
//!         .await
//!         .unwrap();
//!
//!     let record = StoryRecord::new("The Brave Turtle", "Once", "upon", "a time");
//!     let handle = store.save(&record).await.unwrap();
//!
//!     // Images settle in the background
//!     for (slot, outcome) in handle.wait().await {
//!         println!("{slot}: {outcome:?}");
//!     }
//! }
//! ```

pub mod blobs;
pub mod error;
pub mod favorites;

// Re-exports
pub use blobs::{BlobStore, BlobStoreConfig, FsBlobStore, InMemoryBlobStore};
pub use error::StorageError;
pub use favorites::{AssetOutcome, LocalFavoritesStore, SaveHandle};
