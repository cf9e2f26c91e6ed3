//! Archive validation: minimum plausible size and SHA-256 checksum

use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::downloader::core::error::{DownloadError, FileOperation, Result};
use crate::downloader::core::progress::{emit, ProgressCallback, ProgressEvent};

/// Anything at or below this size is an error page or a truncated transfer
pub const MIN_ARCHIVE_SIZE: u64 = 1024;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Compute the lowercase hex SHA-256 of a file, streaming it in 64KB blocks
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Normalise a declared checksum for comparison
fn normalize_checksum(checksum: &str) -> String {
    checksum.trim().to_ascii_lowercase()
}

/// Validation requirements for a cached or freshly downloaded archive
#[derive(Debug, Clone)]
pub struct FileValidation {
    /// Expected SHA-256 in hex; `None` skips the hash check
    pub checksum: Option<String>,
    /// File must be strictly larger than this
    pub min_size: u64,
}

impl Default for FileValidation {
    fn default() -> Self {
        Self {
            checksum: None,
            min_size: MIN_ARCHIVE_SIZE,
        }
    }
}

impl FileValidation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty strings mean "no checksum declared"
    pub fn with_checksum<S: AsRef<str>>(mut self, checksum: S) -> Self {
        let checksum = normalize_checksum(checksum.as_ref());
        self.checksum = if checksum.is_empty() { None } else { Some(checksum) };
        self
    }

    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Check size only. Cheap, no hashing.
    pub async fn check_size(&self, path: &Path) -> Result<u64> {
        let size = fs::metadata(path)
            .await
            .map_err(|e| DownloadError::file_system(path, FileOperation::Metadata, e))?
            .len();

        if size <= self.min_size {
            return Err(DownloadError::FileTooSmall {
                file: path.to_path_buf(),
                size,
                minimum: self.min_size,
            });
        }
        Ok(size)
    }

    /// Validate a file against the configured requirements
    ///
    /// Returns the file size on success.
    pub async fn validate_file(&self, path: &Path, progress_callback: Option<&ProgressCallback>) -> Result<u64> {
        let size = self.check_size(path).await?;

        let Some(expected) = self.checksum.clone() else {
            return Ok(size);
        };

        let file = path.display().to_string();
        emit(progress_callback, ProgressEvent::ValidationStarted { file: file.clone() });

        let owned = path.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || sha256_file(&owned))
            .await
            .map_err(|e| {
                DownloadError::file_system(path, FileOperation::Read, std::io::Error::other(e))
            })?
            .map_err(|e| DownloadError::file_system(path, FileOperation::Read, e))?;

        let valid = actual == expected;
        debug!("SHA-256 validation for {}: expected={}, actual={}, passed={}", file, expected, actual, valid);
        emit(progress_callback, ProgressEvent::ValidationComplete { file, valid });

        if !valid {
            return Err(DownloadError::ChecksumMismatch {
                file: path.to_path_buf(),
                expected,
                actual,
            });
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HELLO_SHA256: &str = "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f";

    #[test]
    fn sha256_matches_known_vector() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"Hello, World!").unwrap();

        assert_eq!(sha256_file(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn empty_checksum_means_none() {
        assert!(FileValidation::new().with_checksum("  ").checksum.is_none());
        assert_eq!(
            FileValidation::new().with_checksum("ABC ").checksum.as_deref(),
            Some("abc")
        );
    }

    #[tokio::test]
    async fn undersized_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.zip");
        std::fs::write(&path, b"0123456789").unwrap();

        let err = FileValidation::new().validate_file(&path, None).await.unwrap_err();
        assert!(matches!(err, DownloadError::FileTooSmall { size: 10, .. }));
    }

    #[tokio::test]
    async fn checksum_is_compared_case_insensitively() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"Hello, World!").unwrap();

        let validation = FileValidation::new()
            .with_min_size(0)
            .with_checksum(HELLO_SHA256.to_uppercase());
        assert_eq!(validation.validate_file(&path, None).await.unwrap(), 13);
    }

    #[tokio::test]
    async fn checksum_mismatch_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"Hello, World!").unwrap();

        let validation = FileValidation::new().with_min_size(0).with_checksum("00ff");
        let err = validation.validate_file(&path, None).await.unwrap_err();
        match err {
            DownloadError::ChecksumMismatch { expected, actual, .. } => {
                assert_eq!(expected, "00ff");
                assert_eq!(actual, HELLO_SHA256);
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }
    }
}
