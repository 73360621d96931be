//! Error types for storyscape-storage
//!
//! This module defines the error types used throughout the storage crate.

use storyscape_core::DecodeError;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Requested item was not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob exceeds the configured maximum size
    #[error("Blob {name} exceeds maximum size ({size} > {max} bytes)")]
    CapacityExceeded { name: String, size: u64, max: u64 },

    /// Blob name is empty or would escape the store directory
    #[error("Invalid blob name: {0:?}")]
    InvalidName(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A persisted entry could not be decoded
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

impl From<DecodeError> for StorageError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Encode(message) => StorageError::Serialization(message),
            malformed @ DecodeError::Malformed { .. } => {
                StorageError::Deserialization(malformed.to_string())
            }
        }
    }
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new InvalidName error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName(name.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}
