//! Collaborator traits for the StoryScape library
//!
//! The library talks to the outside world only through these traits, which
//! keeps the sync and favorites logic testable against in-memory doubles.
//!
//! ## Key Traits
//!
//! - [`AuthSource`]: Who is signed in
//! - [`RemoteStorySource`]: The per-owner remote story collection
//! - [`AssetFetcher`]: Raw bytes for an asset URI
//! - [`Clock`]: Time abstraction for testability

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use futures::Stream;
use parking_lot::Mutex;

use crate::bucketing::CalendarZone;
use crate::error::{FetchError, SourceError};
use crate::story::{OwnerId, RemoteDocument, StoryId, StoryRecord};

/// Push feed of full result sets.
///
/// Each item is the complete, ordered collection for the owner at that
/// moment, or an error the feed encountered.
pub type DocumentFeed =
    Pin<Box<dyn Stream<Item = Result<Vec<RemoteDocument>, SourceError>> + Send>>;

/// Source of the current owner identity
pub trait AuthSource: Send + Sync {
    /// The signed-in owner, or `None` when signed out
    fn current_owner(&self) -> Option<OwnerId>;
}

/// A subscribable, per-owner story collection
///
/// Implementations deliver results ordered by creation time, newest first,
/// and push a fresh full set whenever anything in the result set changes.
#[async_trait]
pub trait RemoteStorySource: Send + Sync {
    /// Open a change feed for an owner's stories
    async fn watch(&self, owner: &OwnerId) -> Result<DocumentFeed, SourceError>;

    /// Create or replace a story document
    async fn create(&self, record: &StoryRecord) -> Result<(), SourceError>;

    /// Delete a story document
    async fn delete(&self, id: &StoryId) -> Result<(), SourceError>;
}

/// Downloads an asset by URI (plain GET, no extra headers)
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Bytes, FetchError>;
}

/// Wall-clock abstraction
///
/// Bucketing depends on "now" and on the calendar it is read in, so a clock
/// reports both the instant and the zone to place instants on.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn zone(&self) -> CalendarZone;
}

/// Real clock on the process's local calendar
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn zone(&self) -> CalendarZone {
        CalendarZone::Local
    }
}

/// Manually driven clock for tests
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    zone: CalendarZone,
}

impl FixedClock {
    /// Start at `now`, on a calendar with `now`'s constant offset
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self::in_zone(now.with_timezone(&Utc), CalendarZone::Fixed(*now.offset()))
    }

    pub fn in_zone(now: DateTime<Utc>, zone: CalendarZone) -> Self {
        Self {
            now: Mutex::new(now),
            zone,
        }
    }

    pub fn set<Tz: TimeZone>(&self, now: DateTime<Tz>) {
        *self.now.lock() = now.with_timezone(&Utc);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn zone(&self) -> CalendarZone {
        self.zone
    }
}
