//! Named blob storage
//!
//! A flat namespace of byte blobs addressed by file-like names
//! (`{id}.json`, `{id}_intro.jpg`). The favorites cache is built on top of
//! this trait so it can run against a directory or purely in memory.

mod fs;
mod memory;

pub use fs::{BlobStoreConfig, FsBlobStore};
pub use memory::InMemoryBlobStore;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Durable storage of named byte blobs
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a blob, replacing any previous content under the same name
    async fn write(&self, name: &str, data: Bytes) -> Result<(), StorageError>;

    /// Read a blob, `None` when absent
    async fn read(&self, name: &str) -> Result<Option<Bytes>, StorageError>;

    /// Delete a blob; returns whether it existed
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Names of all stored blobs, in no particular order
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Check if a blob exists
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.read(name).await?.is_some())
    }
}

/// Reject names that are empty, hidden, or contain path separators
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.contains('\0')
    {
        return Err(StorageError::invalid_name(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("ABC_intro.jpg").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("../escape.json").is_err());
        assert!(validate_name("dir/file").is_err());
        assert!(validate_name("dir\\file").is_err());
    }
}
