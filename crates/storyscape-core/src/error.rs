//! Error types for StoryScape core

use thiserror::Error;

/// A story payload could not be decoded or encoded
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Malformed story record {key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("Failed to encode story record: {0}")]
    Encode(String),
}

/// Errors reported by the remote story store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Credentials were rejected; the subscription cannot continue
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The store could not be reached (connectivity loss, outage)
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    /// The store refused the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl SourceError {
    /// Whether the error ends a subscription instead of being retried by the feed
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Unauthorized(_))
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }
}

/// Errors fetching an asset by URI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid asset URI: {0}")]
    InvalidUri(String),

    #[error("Asset request to {uri} failed with status {status}")]
    Status { uri: String, status: u16 },

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
