//! Unified error type for the story library.
//!
//! Wraps the collaborator and storage errors into one enum and classifies
//! each failure as fatal (the subscription cannot continue) or recoverable.

use storyscape_core::{FetchError, SourceError};
use storyscape_storage::StorageError;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Unified error type for the story library.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LibraryError {
    /// No owner is signed in.
    #[error("Not signed in")]
    NotAuthenticated,

    /// The remote store rejected the owner's credentials.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// The remote store could not be reached.
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    /// The remote store refused or could not find what was asked for.
    #[error("Remote error: {0}")]
    Remote(String),

    /// Local favorites storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An asset could not be downloaded.
    #[error("Asset error: {0}")]
    Asset(#[from] FetchError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LibraryError {
    /// Whether the error ends the subscription instead of being reported and ridden out
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LibraryError::NotAuthenticated | LibraryError::Unauthorized(_)
        )
    }
}

impl From<SourceError> for LibraryError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Unauthorized(s) => LibraryError::Unauthorized(s),
            SourceError::Unavailable(s) => LibraryError::Unavailable(s),
            SourceError::NotFound(s) | SourceError::Rejected(s) => LibraryError::Remote(s),
        }
    }
}
