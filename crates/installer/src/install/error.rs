//! Installation error types

use std::path::PathBuf;
use thiserror::Error;

use crate::downloader::DownloadError;
use crate::error::ErrorKind;
use crate::install::backup::BackupError;

/// Errors that can occur during installation
#[derive(Debug, Error)]
pub enum InstallError {
    /// Archive entry resolves outside its destination root
    #[error("Archive entry '{entry}' escapes destination root '{root}'")]
    PathTraversal { entry: String, root: PathBuf },

    #[error("Unsupported archive format: '{extension}'")]
    UnsupportedFormat { extension: String },

    /// Destination roots missing or not the expected game layout
    #[error("Invalid installation environment at '{path}': {reason}")]
    InvalidEnvironment { path: PathBuf, reason: String },

    #[error("Failed to extract '{name}'")]
    Entry {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Archive could not be opened or its headers are corrupt
    #[error("Failed to read archive '{path}': {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Installation cancelled")]
    Cancelled,

    #[error("Another installation batch is already running")]
    BatchInProgress,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Backup(#[from] BackupError),
}

pub type Result<T> = std::result::Result<T, InstallError>;

impl InstallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InstallError::PathTraversal { .. } => ErrorKind::PathTraversal,
            InstallError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            InstallError::InvalidEnvironment { .. } => ErrorKind::InvalidEnvironment,
            InstallError::Entry { .. } | InstallError::Archive { .. } | InstallError::Io(_) => ErrorKind::FileSystem,
            InstallError::Cancelled => ErrorKind::Cancelled,
            InstallError::BatchInProgress => ErrorKind::Configuration,
            InstallError::Download(e) => e.kind(),
            InstallError::Backup(e) => e.kind(),
        }
    }

    /// Only transient network failures are worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            InstallError::Download(e) => e.is_recoverable(),
            _ => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            InstallError::PathTraversal { .. } => "path_traversal",
            InstallError::UnsupportedFormat { .. } => "unsupported_format",
            InstallError::InvalidEnvironment { .. } => "invalid_environment",
            InstallError::Entry { .. } => "entry_extraction",
            InstallError::Archive { .. } => "archive_read",
            InstallError::Cancelled => "cancelled",
            InstallError::BatchInProgress => "batch_in_progress",
            InstallError::Io(_) => "io",
            InstallError::Download(e) => e.category(),
            InstallError::Backup(e) => e.category(),
        }
    }

    /// Fold a download cancellation into the installer's own variant
    pub(crate) fn normalize(self) -> Self {
        match self {
            InstallError::Download(DownloadError::Cancelled { .. }) => InstallError::Cancelled,
            other => other,
        }
    }
}
