//! Core types used throughout the downloader system
//!
//! This module contains the fundamental types that all other downloader
//! modules depend on.

pub mod error;
pub mod files;
pub mod progress;
pub mod validation;

// Re-export main types for convenience
pub use error::{DownloadError, FileOperation, Result};
pub use progress::{
    IntoProgressCallback, LogProgressReporter, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter,
};
pub use validation::{sha256_file, FileValidation, MIN_ARCHIVE_SIZE};
