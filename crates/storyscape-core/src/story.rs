//! Story records and their wire encoding
//!
//! A [`StoryRecord`] is the unit everything else in the stack moves around:
//! the remote change feed delivers batches of them, the bucketing engine
//! groups them, and the favorites cache persists snapshots of them.
//!
//! The JSON field names follow the remote collection's schema
//! (`intro_image_url`, `timestamp`, `userId`, ...), and the same encoding is
//! used for favorites on disk so a cached entry can be read back without a
//! translation layer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::asset::AssetSlot;
use crate::error::DecodeError;

/// Stable, globally unique story identifier.
///
/// The id is the join key between remote records, favorite entries, and
/// cached asset names. Once assigned it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier (UUID v4, uppercase like the remote store)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string().to_uppercase())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log output
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StoryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque identity of the user who owns a set of stories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for OwnerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A generated story: three text blocks, a title, and up to two illustrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    /// Defaults to a fresh id when the payload carries none
    #[serde(default = "StoryId::generate", deserialize_with = "id_or_generate")]
    pub id: StoryId,
    pub title: String,
    pub introduction: String,
    pub middle: String,
    pub conclusion: String,
    /// URI of the image shown after the introduction
    #[serde(
        rename = "intro_image_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub intro_image_ref: Option<String>,
    /// URI of the image shown after the middle block
    #[serde(
        rename = "middle_image_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub middle_image_ref: Option<String>,
    /// Defaults to decode time when the payload carries none
    #[serde(
        rename = "timestamp",
        default = "Utc::now",
        deserialize_with = "timestamp_or_now"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,
}

fn id_or_generate<'de, D>(deserializer: D) -> Result<StoryId, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<String>::deserialize(deserializer)?;
    Ok(match id {
        Some(id) if !id.is_empty() => StoryId(id),
        _ => StoryId::generate(),
    })
}

fn timestamp_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.unwrap_or_else(Utc::now))
}

impl StoryRecord {
    /// Create a story with a fresh id, stamped with the current time
    pub fn new(
        title: impl Into<String>,
        introduction: impl Into<String>,
        middle: impl Into<String>,
        conclusion: impl Into<String>,
    ) -> Self {
        Self {
            id: StoryId::generate(),
            title: title.into(),
            introduction: introduction.into(),
            middle: middle.into(),
            conclusion: conclusion.into(),
            intro_image_ref: None,
            middle_image_ref: None,
            created_at: Utc::now(),
            owner_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<StoryId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner_id = Some(owner);
        self
    }

    /// Attach an image reference to one of the two slots
    pub fn with_image(mut self, slot: AssetSlot, uri: impl Into<String>) -> Self {
        match slot {
            AssetSlot::Intro => self.intro_image_ref = Some(uri.into()),
            AssetSlot::Middle => self.middle_image_ref = Some(uri.into()),
        }
        self
    }

    /// Image reference for a slot, if populated
    ///
    /// Blank strings count as absent.
    pub fn asset_ref(&self, slot: AssetSlot) -> Option<&str> {
        let uri = match slot {
            AssetSlot::Intro => self.intro_image_ref.as_deref(),
            AssetSlot::Middle => self.middle_image_ref.as_deref(),
        };
        uri.filter(|uri| !uri.trim().is_empty())
    }

    /// Populated `(slot, uri)` pairs in slot order
    pub fn asset_refs(&self) -> impl Iterator<Item = (AssetSlot, &str)> + '_ {
        AssetSlot::ALL
            .into_iter()
            .filter_map(|slot| self.asset_ref(slot).map(|uri| (slot, uri)))
    }

    /// Decode a record from a remote document payload.
    ///
    /// A non-empty document key overrides any `id` embedded in the payload.
    pub fn decode(key: &str, payload: &serde_json::Value) -> Result<Self, DecodeError> {
        let mut record = StoryRecord::deserialize(payload).map_err(|e| DecodeError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if !key.is_empty() {
            record.id = StoryId::new(key);
        }
        Ok(record)
    }

    /// Encode as pretty JSON (the persisted favorite format)
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        serde_json::to_vec_pretty(self).map_err(|e| DecodeError::Encode(e.to_string()))
    }

    /// Decode from JSON bytes
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed {
            key: String::new(),
            reason: e.to_string(),
        })
    }
}

/// A raw document as delivered by the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteDocument {
    /// The store's document key
    pub key: String,
    /// Undecoded document body
    pub payload: serde_json::Value,
}

impl RemoteDocument {
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }

    /// Encode a record as a document keyed by its id
    pub fn from_record(record: &StoryRecord) -> Result<Self, DecodeError> {
        let payload =
            serde_json::to_value(record).map_err(|e| DecodeError::Encode(e.to_string()))?;
        Ok(Self::new(record.id.as_str(), payload))
    }
}

/// Result of decoding a remote batch
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    /// Successfully decoded records, in remote order
    pub records: Vec<StoryRecord>,
    /// Number of documents dropped as malformed
    pub skipped: usize,
}

/// Decode a batch of remote documents, dropping the malformed ones.
///
/// Remote order is preserved. A bad document never fails the batch.
pub fn decode_documents(documents: &[RemoteDocument]) -> DecodedBatch {
    let mut batch = DecodedBatch {
        records: Vec::with_capacity(documents.len()),
        skipped: 0,
    };

    for document in documents {
        match StoryRecord::decode(&document.key, &document.payload) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                batch.skipped += 1;
                warn!(key = %document.key, error = %e, "Dropping malformed story document");
            }
        }
    }

    debug!(
        decoded = batch.records.len(),
        skipped = batch.skipped,
        "Decoded remote batch"
    );
    batch
}
