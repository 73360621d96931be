//! In-memory blob store
//!
//! Suitable for testing and for running the library without a writable
//! data directory.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::trace;

use super::{BlobStore, validate_name};
use crate::error::StorageError;

/// In-memory implementation of [`BlobStore`]
///
/// Uses `DashMap` for concurrent access.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        validate_name(name)?;
        trace!(name, size = data.len(), "Stored blob");
        self.blobs.insert(name.to_string(), data);
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Option<Bytes>, StorageError> {
        validate_name(name)?;
        Ok(self.blobs.get(name).map(|data| data.value().clone()))
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        validate_name(name)?;
        Ok(self.blobs.remove(name).is_some())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.blobs.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        validate_name(name)?;
        Ok(self.blobs.contains_key(name))
    }
}
