//! # StoryScape Library
//!
//! Live, time-bucketed view of a user's stories plus an offline favorites
//! cache.
//!
//! ## Quick Start
//!
//! ```ignore
//! use storyscape_library::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LibraryError> {
//!     let library = Library::builder()
//!         .data_dir("~/.storyscape")
//!         .auth(auth)
//!         .source(source)
//!         .build()
//!         .await?;
//!
//!     library.start().await?;
//!
//!     let mut updates = library.updates();
//!     while let Some(state) = updates.next().await {
//!         if state == LoadState::Ready {
//!             for section in library.visible_sections() {
//!                 println!("{}: {} stories", section.label, section.len());
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### RemoteStorySync
//!
//! Owns the single live subscription to the owner's remote collection. Every
//! emission is the complete current set; malformed documents are dropped.
//!
//! ### LibraryViewState
//!
//! Buckets the current set into `Today`, `Yesterday`, `Last 7 Days`,
//! `Last 30 Days` and per-month sections, then applies the title search.
//!
//! ### FavoritesCoordinator
//!
//! Tracks favorited ids in memory and persists favorites, with their images,
//! through the local favorites store so they stay readable offline.
//!
//! ## Configuration
//!
//! ```ignore
//! // Constrained devices
//! let library = Library::preset(Preset::LowMemory)
//!     .auth(auth)
//!     .source(source)
//!     .build()
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod favorites;
pub mod http;
pub mod library;
pub mod stream;
pub mod sync;
pub mod view;

// Re-export main types
pub use config::{LibraryBuilder, LibraryConfig, Preset};
pub use error::{LibraryError, Result};
pub use favorites::{FavoritesCoordinator, ToggleOutcome};
pub use http::HttpAssetFetcher;
pub use library::Library;
pub use sync::{RemoteStorySync, SyncEvent, SyncStream};
pub use view::{LibraryViewState, LoadState};

// Re-export the types callers handle directly
pub use storyscape_core::{
    AssetSlot, AuthSource, CalendarZone, Clock, OwnerId, RemoteStorySource, Section, StoryId,
    StoryRecord,
};
pub use storyscape_storage::{AssetOutcome, LocalFavoritesStore, SaveHandle};

/// Prelude for convenient imports.
///
/// ```ignore
/// use storyscape_library::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AssetOutcome, AssetSlot, FavoritesCoordinator, Library, LibraryError, LoadState,
        OwnerId, Preset, Result, Section, StoryId, StoryRecord, SyncEvent, ToggleOutcome,
    };

    // Re-export futures StreamExt for convenient stream iteration
    pub use futures::StreamExt;
}
