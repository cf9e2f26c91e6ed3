//! Shared error taxonomy
//!
//! Each subsystem keeps its own error enum with rich context; `ErrorKind`
//! collapses them into the coarse categories callers branch on.

use std::fmt;

/// Coarse error category shared by every subsystem error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport or HTTP failure. Retryable by the caller.
    Network,
    /// Checksum mismatch or undersized payload
    Integrity,
    /// The source cannot be fetched without user intervention
    ManualActionRequired,
    /// An archive entry tried to escape its destination root
    PathTraversal,
    /// Archive container not recognised
    UnsupportedFormat,
    /// Destination roots missing or malformed
    InvalidEnvironment,
    /// Snapshot could not be taken or restored
    BackupFailure,
    /// Named resource does not exist
    NotFound,
    /// Operation stopped by the cancellation token
    Cancelled,
    /// Local filesystem failure outside the categories above
    FileSystem,
    /// Invalid configuration or caller input
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Network => "network error",
            ErrorKind::Integrity => "integrity error",
            ErrorKind::ManualActionRequired => "manual action required",
            ErrorKind::PathTraversal => "path traversal",
            ErrorKind::UnsupportedFormat => "unsupported format",
            ErrorKind::InvalidEnvironment => "invalid environment",
            ErrorKind::BackupFailure => "backup failure",
            ErrorKind::NotFound => "not found",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::FileSystem => "file system error",
            ErrorKind::Configuration => "configuration error",
        };
        f.write_str(name)
    }
}
