//! Content-addressed archive cache
//!
//! Archives are stored as `<cache_dir>/<id>_<version>_<url hash>.<ext>`. Keying
//! on the URL hash means a corrected download URL for the same version never
//! collides with a stale entry.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::files::remove_quietly;
use crate::downloader::core::{DownloadError, FileValidation};
use crate::models::Mod;

/// Hex characters of the URL digest kept in the key
const URL_HASH_LEN: usize = 16;

/// Aggregate cache usage
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub dir: PathBuf,
    pub total_bytes: u64,
    pub file_count: usize,
}

fn sanitize_component(value: &str) -> String {
    value.replace(['/', '\\'], "_")
}

/// Deterministic cache key for a mod: `(id, version, sha256(url))`
pub fn cache_key(m: &Mod) -> String {
    let digest = hex::encode(Sha256::digest(m.download_url.as_bytes()));
    format!(
        "{}_{}_{}",
        sanitize_component(&m.id),
        sanitize_component(&m.version),
        &digest[..URL_HASH_LEN]
    )
}

/// Archive extension guessed from the download URL
pub fn archive_extension(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.contains(".rar") {
        ".rar"
    } else if lower.contains(".7z") {
        ".7z"
    } else {
        ".zip"
    }
}

/// Maps mods to validated archive files on disk
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: PathBuf,
    min_size: u64,
    verify_checksums: bool,
}

impl ContentCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        let defaults = DownloadConfig::default();
        Self {
            dir: dir.into(),
            min_size: defaults.min_archive_size,
            verify_checksums: defaults.verify_checksums,
        }
    }

    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            dir: config.cache_dir.clone(),
            min_size: config.min_archive_size,
            verify_checksums: config.verify_checksums,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_key(&self, m: &Mod) -> String {
        cache_key(m)
    }

    /// Slot for a mod's archive, whether or not it is populated
    pub fn entry_path(&self, m: &Mod) -> PathBuf {
        self.dir
            .join(format!("{}{}", cache_key(m), archive_extension(&m.download_url)))
    }

    pub(crate) fn validation_for(&self, m: &Mod) -> FileValidation {
        let validation = FileValidation::new().with_min_size(self.min_size);
        if self.verify_checksums {
            validation.with_checksum(&m.checksum)
        } else {
            validation
        }
    }

    /// True iff the slot holds a plausibly sized file that matches the
    /// declared checksum. A file failing the checksum is deleted.
    pub async fn is_cached(&self, m: &Mod) -> bool {
        let path = self.entry_path(m);
        if !path.is_file() {
            return false;
        }

        match self.validation_for(m).validate_file(&path, None).await {
            Ok(size) => {
                debug!("Cache hit for {}: {} ({} bytes)", m.id, path.display(), size);
                true
            }
            Err(DownloadError::ChecksumMismatch { expected, actual, .. }) => {
                warn!(
                    "Cached archive {} failed checksum (expected {}, got {}), removing",
                    path.display(),
                    expected,
                    actual
                );
                remove_quietly(&path).await;
                false
            }
            Err(e) => {
                debug!("Cache entry {} unusable: {}", path.display(), e);
                false
            }
        }
    }

    /// Path of a valid cached archive
    pub async fn cached_path(&self, m: &Mod) -> Option<PathBuf> {
        if self.is_cached(m).await {
            Some(self.entry_path(m))
        } else {
            None
        }
    }

    /// Remove the entire cache directory
    pub async fn clear(&self) -> std::io::Result<()> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Total bytes of files in the cache
    pub fn size(&self) -> u64 {
        self.stats().total_bytes
    }

    pub fn stats(&self) -> CacheStats {
        let mut total_bytes = 0u64;
        let mut file_count = 0usize;

        for entry in WalkDir::new(&self.dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            if let Ok(metadata) = entry.metadata() {
                total_bytes += metadata.len();
                file_count += 1;
            }
        }

        CacheStats {
            dir: self.dir.clone(),
            total_bytes,
            file_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::core::sha256_file;
    use tempfile::tempdir;

    fn sample_mod() -> Mod {
        Mod::new("m1", "1.0", "https://x/a.zip")
    }

    #[test]
    fn key_is_stable_and_url_sensitive() {
        let a = sample_mod();
        let b = Mod::new("m1", "1.0", "https://x/b.zip");

        assert_eq!(cache_key(&a), cache_key(&a.clone()));
        assert_ne!(cache_key(&a), cache_key(&b));
        assert!(cache_key(&a).starts_with("m1_1.0_"));
        assert_eq!(cache_key(&a).len(), "m1_1.0_".len() + URL_HASH_LEN);
    }

    #[test]
    fn key_sanitizes_separators() {
        let m = Mod::new("ntw/fcn", "8.2/beta", "https://x/a.zip");
        assert!(cache_key(&m).starts_with("ntw_fcn_8.2_beta_"));
    }

    #[test]
    fn extension_follows_url() {
        assert_eq!(archive_extension("https://x/a.RAR"), ".rar");
        assert_eq!(archive_extension("https://x/a.7z?dl=1"), ".7z");
        assert_eq!(archive_extension("https://drive.google.com/uc?id=1"), ".zip");
    }

    #[tokio::test]
    async fn small_files_are_not_cache_hits() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::new(dir.path());
        let m = sample_mod();

        std::fs::write(cache.entry_path(&m), b"<html>").unwrap();

        assert!(!cache.is_cached(&m).await);
        assert!(cache.cached_path(&m).await.is_none());
    }

    #[tokio::test]
    async fn tampered_entry_is_removed() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::new(dir.path());
        let path = dir.path().join("reference.bin");
        std::fs::write(&path, vec![7u8; 4096]).unwrap();
        let m = sample_mod().with_checksum(sha256_file(&path).unwrap());

        std::fs::write(cache.entry_path(&m), vec![7u8; 4096]).unwrap();
        assert!(cache.is_cached(&m).await);

        std::fs::write(cache.entry_path(&m), vec![8u8; 4096]).unwrap();
        assert!(!cache.is_cached(&m).await);
        assert!(!cache.entry_path(&m).exists());
    }

    #[tokio::test]
    async fn stats_and_clear() {
        let dir = tempdir().unwrap();
        let cache = ContentCache::new(dir.path().join("cache"));
        std::fs::create_dir_all(cache.dir()).unwrap();
        std::fs::write(cache.dir().join("a.zip"), vec![0u8; 2000]).unwrap();
        std::fs::write(cache.dir().join("b.rar"), vec![0u8; 500]).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.total_bytes, 2500);
        assert_eq!(cache.size(), 2500);

        cache.clear().await.unwrap();
        assert!(!cache.dir().exists());
        cache.clear().await.unwrap();
        assert_eq!(cache.stats().file_count, 0);
    }
}
