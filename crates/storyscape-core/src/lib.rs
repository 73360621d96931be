//! # StoryScape Core
//!
//! Core types, pure derivations, and collaborator traits for the StoryScape
//! story library.
//!
//! This crate has no opinion about where stories live. It defines the shape
//! of a story, how a flat list of stories is grouped into time buckets for
//! display, and the narrow contracts the rest of the stack expects from the
//! outside world (identity, the remote document store, asset downloads).
//!
//! ## Key Types
//!
//! - [`StoryRecord`]: The canonical story shape and its wire encoding
//! - [`Section`]: A labeled, time-scoped group of stories
//! - [`AssetSlot`]: The fixed image slots a story can carry
//!
//! ## Key Functions
//!
//! - [`bucket_records`]: Group stories into `Today`, `Yesterday`, ... sections
//! - [`filter_sections`]: Title search over bucketed sections
//! - [`decode_documents`]: Tolerant decoding of a remote batch
//!
//! ## Key Traits
//!
//! - [`AuthSource`]: Current owner identity
//! - [`RemoteStorySource`]: Subscribable per-owner story collection
//! - [`AssetFetcher`]: Plain GET of an asset URI
//! - [`Clock`]: Time abstraction for testability

pub mod asset;
pub mod bucketing;
pub mod error;
pub mod mock;
pub mod search;
pub mod story;
pub mod traits;

// Re-export main types
pub use asset::AssetSlot;
pub use bucketing::{BucketRank, CalendarZone, Section, bucket_records, day_delta};
pub use error::{DecodeError, FetchError, SourceError};
pub use mock::{InMemoryAssetFetcher, InMemoryStorySource, StaticAuth};
pub use search::{filter_sections, title_matches};
pub use story::{DecodedBatch, OwnerId, RemoteDocument, StoryId, StoryRecord, decode_documents};
pub use traits::{
    AssetFetcher, AuthSource, Clock, DocumentFeed, FixedClock, RemoteStorySource, SystemClock,
};
