//! Asset slots and deterministic cache names

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::story::StoryId;

/// One of the two illustration positions in a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetSlot {
    /// Image following the introduction
    Intro,
    /// Image following the middle block
    Middle,
}

impl AssetSlot {
    /// Every slot, in display order
    pub const ALL: [AssetSlot; 2] = [AssetSlot::Intro, AssetSlot::Middle];

    /// Fixed slot suffix used in cache names
    pub fn name(&self) -> &'static str {
        match self {
            AssetSlot::Intro => "intro",
            AssetSlot::Middle => "middle",
        }
    }

    /// Asset key `{id}_{slot}`
    pub fn key(&self, id: &StoryId) -> String {
        format!("{}_{}", id, self.name())
    }

    /// Blob name the cached image is stored under
    pub fn blob_name(&self, id: &StoryId) -> String {
        format!("{}.jpg", self.key(id))
    }
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
