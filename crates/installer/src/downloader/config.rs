//! Configuration types for the downloader system

use std::path::PathBuf;
use std::time::Duration;

use crate::config::InstallerConfig;
use crate::downloader::core::MIN_ARCHIVE_SIZE;

/// Configuration for download operations
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory holding validated archives
    pub cache_dir: PathBuf,
    /// Directory for in-flight downloads
    pub temp_dir: PathBuf,
    /// Overall request timeout, body included
    pub timeout: Duration,
    pub user_agent: String,
    /// Read buffer size used when draining the response body
    pub chunk_size: usize,
    /// Files at or below this size are rejected
    pub min_archive_size: u64,
    /// Verify declared checksums on download and on cache lookup
    pub verify_checksums: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        let base = std::env::temp_dir().join("mod-installer");
        Self {
            cache_dir: base.join("cache"),
            temp_dir: base.join("temp"),
            timeout: Duration::from_secs(600),
            user_agent: format!("mod-installer/{}", env!("CARGO_PKG_VERSION")),
            chunk_size: 64 * 1024,
            min_archive_size: MIN_ARCHIVE_SIZE,
            verify_checksums: true,
        }
    }
}

impl From<&InstallerConfig> for DownloadConfig {
    fn from(config: &InstallerConfig) -> Self {
        DownloadConfigBuilder::new()
            .cache_dir(&config.cache_dir)
            .temp_dir(&config.temp_dir)
            .verify_checksums(config.verify_checksums)
            .build()
    }
}

/// Fluent builder for [`DownloadConfig`]
#[derive(Debug, Clone, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.temp_dir = dir.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Clamped to 16-64 KiB
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size.clamp(16 * 1024, 64 * 1024);
        self
    }

    pub fn min_archive_size(mut self, size: u64) -> Self {
        self.config.min_archive_size = size;
        self
    }

    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    pub fn build(self) -> DownloadConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_chunk_size() {
        assert_eq!(DownloadConfigBuilder::new().chunk_size(1).build().chunk_size, 16 * 1024);
        assert_eq!(DownloadConfigBuilder::new().chunk_size(1 << 20).build().chunk_size, 64 * 1024);
    }

    #[test]
    fn installer_config_maps_paths() {
        let mut installer = InstallerConfig::default();
        installer.cache_dir = PathBuf::from("/c");
        installer.temp_dir = PathBuf::from("/t");
        installer.verify_checksums = false;

        let config = DownloadConfig::from(&installer);
        assert_eq!(config.cache_dir, PathBuf::from("/c"));
        assert_eq!(config.temp_dir, PathBuf::from("/t"));
        assert!(!config.verify_checksums);
        assert_eq!(config.min_archive_size, MIN_ARCHIVE_SIZE);
    }
}
