//! Downloader module
//!
//! Content cache, share-link resolution and the HTTP transfer that fills
//! the cache.

pub mod cache;
pub mod config;
pub mod core;
pub mod http;
pub mod metrics;
pub mod sources;

pub use cache::{archive_extension, cache_key, CacheStats, ContentCache};
pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use core::{
    sha256_file, DownloadError, FileOperation, FileValidation, IntoProgressCallback, LogProgressReporter,
    NullProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter, Result, MIN_ARCHIVE_SIZE,
};
pub use http::HttpDownloader;
pub use metrics::{DownloadMetrics, DownloadMetricsSnapshot};
pub use sources::DownloadSource;

#[cfg(test)]
mod tests;
