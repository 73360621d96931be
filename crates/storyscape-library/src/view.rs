//! Derived library view: records → sections → search-filtered sections.
//!
//! ```text
//! Idle ──start──▶ Loading ──snapshot──▶ Ready ◀──snapshot──┐
//!                    ▲                    │ └──────────────┘
//!                    └──retry── Error ◀───┘ fatal
//! ```
//!
//! Transient errors are recorded in [`LibraryViewState::last_error`] without
//! changing state or data. A fatal error keeps the last good sections visible.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use storyscape_core::{Clock, Section, StoryRecord, filter_sections};
use tracing::debug;

use crate::error::LibraryError;
use crate::sync::SyncEvent;

/// Lifecycle of the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Current records plus everything derived from them
pub struct LibraryViewState {
    clock: Arc<dyn Clock>,
    state: LoadState,
    records: Vec<StoryRecord>,
    sections: Vec<Section>,
    visible: Vec<Section>,
    search_text: String,
    last_error: Option<LibraryError>,
    now: DateTime<Utc>,
}

impl LibraryViewState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            state: LoadState::Idle,
            records: Vec::new(),
            sections: Vec::new(),
            visible: Vec::new(),
            search_text: String::new(),
            last_error: None,
            now,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn records(&self) -> &[StoryRecord] {
        &self.records
    }

    /// All sections, before search filtering
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Sections after search filtering
    pub fn visible_sections(&self) -> &[Section] {
        &self.visible
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn last_error(&self) -> Option<&LibraryError> {
        self.last_error.as_ref()
    }

    /// The `now` the current sections were bucketed against
    pub fn bucketed_at(&self) -> DateTime<Utc> {
        self.now
    }

    /// A subscription is starting
    pub fn start_loading(&mut self) {
        self.state = LoadState::Loading;
    }

    /// Fold one subscription event into the view
    pub fn apply(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Snapshot(records) => {
                self.records = records;
                self.last_error = None;
                self.state = LoadState::Ready;
                self.now = self.clock.now();
                self.rebucket();
            }
            SyncEvent::Transient(error) => {
                self.last_error = Some(error);
            }
            SyncEvent::Fatal(error) => {
                self.last_error = Some(error);
                self.state = LoadState::Error;
            }
        }
        debug!(state = ?self.state, records = self.records.len(), "View updated");
    }

    /// A subscription could not be opened; retry leaves this via `Loading`
    pub fn fail(&mut self, error: LibraryError) {
        self.apply(SyncEvent::Fatal(error));
    }

    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
        self.visible = filter_sections(&self.sections, &self.search_text);
    }

    /// Re-bucket against the clock's current time (e.g. after midnight)
    pub fn refresh(&mut self) {
        let now = self.clock.now();
        self.refresh_at(now);
    }

    /// Re-bucket against an explicit `now`, on the clock's calendar
    pub fn refresh_at<Tz: TimeZone>(&mut self, now: DateTime<Tz>) {
        self.now = now.with_timezone(&Utc);
        self.rebucket();
    }

    /// Leave the error state; returns false if not in it
    pub fn retry(&mut self) -> bool {
        if self.state == LoadState::Error {
            self.state = LoadState::Loading;
            true
        } else {
            false
        }
    }

    /// Drop all data and return to `Idle`
    pub fn reset(&mut self) {
        self.state = LoadState::Idle;
        self.records.clear();
        self.sections.clear();
        self.visible.clear();
        self.last_error = None;
    }

    fn rebucket(&mut self) {
        self.sections = self.clock.zone().bucket(&self.records, self.now);
        self.visible = filter_sections(&self.sections, &self.search_text);
    }
}
