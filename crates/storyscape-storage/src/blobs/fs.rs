//! Filesystem blob store
//!
//! One file per blob in a flat directory. Writes go to a hidden temp file
//! first and are renamed into place, so readers never observe a torn blob.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::{BlobStore, validate_name};
use crate::error::StorageError;

/// Configuration for the filesystem blob store
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    /// Directory holding the blobs
    pub base_dir: PathBuf,
    /// Maximum blob size (bytes)
    pub max_blob_size: u64,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/favorites"),
            max_blob_size: 32 * 1024 * 1024, // 32MB
        }
    }
}

impl BlobStoreConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }
}

/// Directory-backed blob store
pub struct FsBlobStore {
    config: BlobStoreConfig,
    temp_counter: AtomicU64,
}

impl FsBlobStore {
    /// Create a new store, creating the directory if needed
    pub async fn new(config: BlobStoreConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.base_dir).await?;

        info!(path = %config.base_dir.display(), "Blob store initialized");

        Ok(Self {
            config,
            temp_counter: AtomicU64::new(0),
        })
    }

    /// Open a store in `dir` with default limits
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::new(BlobStoreConfig::new(dir)).await
    }

    /// Directory holding the blobs
    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.config.base_dir.join(name))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        // Hidden names never collide with valid blob names and are skipped by `list`
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.config.base_dir.join(format!(".{name}.{n}.tmp"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn write(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.blob_path(name)?;

        if data.len() as u64 > self.config.max_blob_size {
            return Err(StorageError::CapacityExceeded {
                name: name.to_string(),
                size: data.len() as u64,
                max: self.config.max_blob_size,
            });
        }

        // Write atomically (write to temp, then rename)
        let temp_path = self.temp_path(name);
        let result = async {
            let mut file = File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e.to_string()));
        }

        debug!("Stored blob");
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Option<Bytes>, StorageError> {
        let path = self.blob_path(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(name)?;

        match fs::remove_file(&path).await {
            Ok(_) => {
                debug!("Deleted blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.config.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str()
                && validate_name(name).is_ok()
            {
                names.push(name.to_string());
            }
        }

        Ok(names)
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.blob_path(name)?;
        Ok(fs::try_exists(&path).await?)
    }
}
