//! File operation utilities shared by the cache and the HTTP downloader

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::{debug, warn};

use crate::downloader::core::error::{DownloadError, FileOperation, Result};

/// Path of the working file for a download keyed by `cache_key`
///
/// Lives in the temp directory, never in the cache slot itself.
pub fn create_temp_path(temp_dir: &Path, cache_key: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    temp_dir.join(format!("download_{}_{}.tmp", cache_key, stamp))
}

pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| DownloadError::file_system(dir, FileOperation::CreateDir, e))
}

/// Remove a file, ignoring "not found" and logging anything else
pub async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Move a fully validated temp file into its cache slot
///
/// The file is either visible under `dest_path` complete or not at all. When
/// the temp dir sits on another filesystem the file is first copied next to
/// the destination and renamed from there.
pub async fn atomic_rename(temp_path: &Path, dest_path: &Path) -> Result<()> {
    if let Some(parent) = dest_path.parent() {
        ensure_dir(parent).await?;
    }

    match fs::rename(temp_path, dest_path).await {
        Ok(()) => {
            debug!("Atomically renamed {} to {}", temp_path.display(), dest_path.display());
            return Ok(());
        }
        Err(e) => debug!("Direct rename failed ({}), staging next to destination", e),
    }

    let staging = dest_path.with_extension("part");
    if let Err(e) = fs::copy(temp_path, &staging).await {
        remove_quietly(&staging).await;
        return Err(DownloadError::file_system(&staging, FileOperation::Write, e));
    }
    if let Err(e) = fs::rename(&staging, dest_path).await {
        remove_quietly(&staging).await;
        return Err(DownloadError::file_system(dest_path, FileOperation::Move, e));
    }
    remove_quietly(temp_path).await;
    Ok(())
}
