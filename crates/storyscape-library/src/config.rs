//! Configuration and presets for the story library.
//!
//! Provides sensible defaults with the ability to customize behavior
//! through the builder pattern.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use storyscape_core::{AssetFetcher, AuthSource, Clock, RemoteStorySource};
use storyscape_storage::{BlobStore, BlobStoreConfig};

/// Preset configurations for common use cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Preset {
    /// Balanced defaults for general use.
    #[default]
    Default,
    /// Small buffers and a tight cap on cached image size.
    LowMemory,
    /// Flaky or absent connectivity.
    /// - Short asset timeout so downloads fail fast
    Offline,
}

impl Preset {
    /// Capacity of the sync event channels.
    pub fn event_channel_capacity(&self) -> usize {
        match self {
            Preset::Default => 256,
            Preset::LowMemory => 16,
            Preset::Offline => 256,
        }
    }

    /// Request timeout for asset downloads.
    pub fn fetch_timeout(&self) -> Duration {
        match self {
            Preset::Default => Duration::from_secs(30),
            Preset::LowMemory => Duration::from_secs(30),
            Preset::Offline => Duration::from_secs(5),
        }
    }

    /// Largest cached blob, in bytes.
    pub fn max_blob_size(&self) -> u64 {
        match self {
            Preset::Default | Preset::Offline => 32 * 1024 * 1024,
            Preset::LowMemory => 4 * 1024 * 1024,
        }
    }
}

/// Configuration for the story library.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Root directory for local data.
    pub data_dir: PathBuf,
    /// Subdirectory of `data_dir` holding favorites.
    pub favorites_dir: String,
    /// Configuration preset.
    pub preset: Preset,
    /// Overrides the preset's asset timeout.
    pub fetch_timeout: Option<Duration>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("storyscape"),
            favorites_dir: "favorites".to_string(),
            preset: Preset::Default,
            fetch_timeout: None,
        }
    }
}

impl LibraryConfig {
    /// Create a new configuration with a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Directory the favorites cache lives in.
    pub fn favorites_path(&self) -> PathBuf {
        self.data_dir.join(&self.favorites_dir)
    }

    pub fn event_channel_capacity(&self) -> usize {
        self.preset.event_channel_capacity()
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
            .unwrap_or_else(|| self.preset.fetch_timeout())
    }

    /// Filesystem store settings for the favorites cache.
    pub fn blob_store_config(&self) -> BlobStoreConfig {
        BlobStoreConfig {
            base_dir: self.favorites_path(),
            max_blob_size: self.preset.max_blob_size(),
        }
    }
}

/// Builder for creating a [`Library`](crate::Library) with custom configuration.
///
/// The auth and remote source collaborators are required. The asset fetcher
/// defaults to HTTP, the blob store to the favorites directory, and the
/// clock to the system clock.
#[derive(Default)]
pub struct LibraryBuilder {
    pub(crate) config: LibraryConfig,
    pub(crate) auth: Option<Arc<dyn AuthSource>>,
    pub(crate) source: Option<Arc<dyn RemoteStorySource>>,
    pub(crate) fetcher: Option<Arc<dyn AssetFetcher>>,
    pub(crate) blobs: Option<Arc<dyn BlobStore>>,
    pub(crate) clock: Option<Arc<dyn Clock>>,
}

impl LibraryBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder with a preset configuration.
    pub fn with_preset(preset: Preset) -> Self {
        Self {
            config: LibraryConfig {
                preset,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: LibraryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the favorites subdirectory name.
    pub fn favorites_dir(mut self, name: impl Into<String>) -> Self {
        self.config.favorites_dir = name.into();
        self
    }

    /// Override the asset download timeout.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = Some(timeout);
        self
    }

    pub fn auth(mut self, auth: Arc<dyn AuthSource>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn source(mut self, source: Arc<dyn RemoteStorySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Use a custom blob store instead of the favorites directory.
    pub fn blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the configuration.
    pub fn build_config(self) -> LibraryConfig {
        self.config
    }
}

// Helper module for directory resolution
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|home| PathBuf::from(home).join("Library/Application Support"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|home| PathBuf::from(home).join(".local/share"))
                })
        }

        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_defaults() {
        assert_eq!(Preset::Default.event_channel_capacity(), 256);
        assert_eq!(Preset::LowMemory.event_channel_capacity(), 16);
        assert!(Preset::Offline.fetch_timeout() < Preset::Default.fetch_timeout());
    }

    #[test]
    fn test_builder() {
        let config = LibraryBuilder::with_preset(Preset::LowMemory)
            .data_dir("/tmp/storyscape")
            .favorites_dir("starred")
            .fetch_timeout(Duration::from_secs(2))
            .build_config();

        assert_eq!(config.favorites_path(), PathBuf::from("/tmp/storyscape/starred"));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(2));
        assert_eq!(config.blob_store_config().max_blob_size, 4 * 1024 * 1024);
    }

    #[test]
    fn test_default_data_dir_is_namespaced() {
        let config = LibraryConfig::default();
        assert!(config.data_dir.ends_with("storyscape"));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
    }
}
