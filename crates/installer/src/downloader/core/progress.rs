//! Progress tracking and reporting for download operations

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress callback for download operations
///
/// Invoked inline on the download task, so it must be cheap.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted during download operations
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    /// Emitted after every chunk written to disk
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    /// The archive was served from the cache without network access
    CacheHit {
        path: String,
        size: u64,
    },
    ValidationStarted {
        file: String,
    },
    ValidationComplete {
        file: String,
        valid: bool,
    },
    Warning {
        url: String,
        message: String,
    },
    Error {
        url: String,
        error: String,
    },
}

impl ProgressEvent {
    /// `(processed, total)` byte counters when the event carries them.
    /// An unknown total is reported as 0.
    pub fn byte_counters(&self) -> Option<(u64, u64)> {
        match self {
            ProgressEvent::DownloadProgress { downloaded, total, .. } => Some((*downloaded, total.unwrap_or(0))),
            ProgressEvent::DownloadComplete { final_size, .. } => Some((*final_size, *final_size)),
            ProgressEvent::CacheHit { size, .. } => Some((*size, *size)),
            _ => None,
        }
    }
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_cache_hit(&self, _path: &str, _size: u64) {}
    fn on_validation_started(&self, _file: &str) {}
    fn on_validation_complete(&self, _file: &str, _valid: bool) {}
    fn on_warning(&self, _url: &str, _message: &str) {}
    fn on_error(&self, _url: &str, _error: &str) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total } => {
                self.on_download_progress(&url, downloaded, total);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::CacheHit { path, size } => {
                self.on_cache_hit(&path, size);
            }
            ProgressEvent::ValidationStarted { file } => {
                self.on_validation_started(&file);
            }
            ProgressEvent::ValidationComplete { file, valid } => {
                self.on_validation_complete(&file, valid);
            }
            ProgressEvent::Warning { url, message } => {
                self.on_warning(&url, &message);
            }
            ProgressEvent::Error { url, error } => {
                self.on_error(&url, &error);
            }
        })
    }
}

/// Reporter that forwards events to `tracing`
#[derive(Debug, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        info!(%url, ?total_size, "download started");
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        info!(%url, final_size, "download complete");
    }

    fn on_cache_hit(&self, path: &str, size: u64) {
        info!(%path, size, "served from cache");
    }

    fn on_validation_complete(&self, file: &str, valid: bool) {
        debug!(%file, valid, "validation complete");
    }

    fn on_warning(&self, url: &str, message: &str) {
        warn!(%url, "{}", message);
    }

    fn on_error(&self, url: &str, error: &str) {
        warn!(%url, "download failed: {}", error);
    }
}

/// Null progress reporter that does nothing
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Send `event` to the callback if there is one
pub(crate) fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}
