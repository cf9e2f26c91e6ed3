//! Error types for the downloader with context and recovery information

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors raised while fetching an archive into the cache
#[derive(Error, Debug)]
pub enum DownloadError {
    /// HTTP transport failure
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request to '{url}' timed out after {duration_secs}s (try again or check network)")]
    NetworkTimeout { url: String, duration_secs: u64 },

    /// Server sent a web page where an archive was expected
    #[error("Expected an archive from '{url}' but received '{content_type}' (login or error page?)")]
    HtmlResponse { url: String, content_type: String },

    /// Payload below the minimum plausible archive size
    #[error("Downloaded file '{file}' is too small ({size} bytes, need more than {minimum})")]
    FileTooSmall { file: PathBuf, size: u64, minimum: u64 },

    #[error("Checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: PathBuf,
        expected: String,
        actual: String,
    },

    /// The source cannot be fetched as a single byte stream
    #[error("Manual download required for '{url}': {instructions}")]
    ManualActionRequired { url: String, instructions: String },

    #[error("Invalid URL '{url}': {suggestion}")]
    InvalidUrl {
        url: String,
        suggestion: String,
        #[source]
        source: url::ParseError,
    },

    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    #[error("Download cancelled: {url}")]
    Cancelled { url: String },
}

/// Types of file operations for error context
#[derive(Debug, Clone, PartialEq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    Metadata,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::Metadata => write!(f, "reading metadata"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Attach path and operation context to an I/O error
    pub fn file_system<P: Into<PathBuf>>(path: P, operation: FileOperation, source: std::io::Error) -> Self {
        DownloadError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::HttpRequest { .. }
            | DownloadError::HttpStatus { .. }
            | DownloadError::NetworkTimeout { .. }
            | DownloadError::HtmlResponse { .. } => ErrorKind::Network,
            DownloadError::FileTooSmall { .. } | DownloadError::ChecksumMismatch { .. } => ErrorKind::Integrity,
            DownloadError::ManualActionRequired { .. } => ErrorKind::ManualActionRequired,
            DownloadError::InvalidUrl { .. } => ErrorKind::Configuration,
            DownloadError::FileSystem { .. } => ErrorKind::FileSystem,
            DownloadError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Whether a caller could reasonably retry. Nothing in this crate retries.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DownloadError::HttpRequest { source, .. } => {
                // Client errors (4xx) won't fix themselves
                source.status().map_or(true, |status| status.is_server_error() || status == 429)
            }
            DownloadError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            DownloadError::NetworkTimeout { .. } => true,
            _ => false,
        }
    }

    /// Error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::HttpRequest { .. } => "http_request",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::NetworkTimeout { .. } => "network_timeout",
            DownloadError::HtmlResponse { .. } => "html_response",
            DownloadError::FileTooSmall { .. } => "file_too_small",
            DownloadError::ChecksumMismatch { .. } => "checksum_mismatch",
            DownloadError::ManualActionRequired { .. } => "manual_action_required",
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::FileSystem { .. } => "file_system",
            DownloadError::Cancelled { .. } => "cancelled",
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".to_string());
        DownloadError::HttpRequest { url, source: error }
    }
}

impl DownloadError {
    /// Classify a request failure; timeouts carry the client's configured limit
    pub(crate) fn request(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            let url = error.url().map(|u| u.to_string()).unwrap_or_else(|| "<unknown>".to_string());
            DownloadError::NetworkTimeout {
                url,
                duration_secs: timeout.as_secs(),
            }
        } else {
            error.into()
        }
    }

    pub(crate) fn invalid_url(url: &str, error: url::ParseError) -> Self {
        let suggestion = match error {
            url::ParseError::EmptyHost => "URL must have a valid hostname",
            url::ParseError::InvalidPort => "Port number must be between 1 and 65535",
            url::ParseError::RelativeUrlWithoutBase => "URL must be absolute (include http:// or https://)",
            _ => "Check URL format and try again",
        }
        .to_string();

        DownloadError::InvalidUrl {
            url: url.to_string(),
            suggestion,
            source: error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_errors_are_not_recoverable() {
        let err = DownloadError::FileTooSmall {
            file: PathBuf::from("a.zip"),
            size: 10,
            minimum: 1024,
        };
        assert_eq!(err.kind(), ErrorKind::Integrity);
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "file_too_small");
    }

    #[test]
    fn server_errors_are_recoverable() {
        let err = DownloadError::HttpStatus { url: "https://x".into(), status: 503 };
        assert!(err.is_recoverable());
        assert_eq!(err.kind(), ErrorKind::Network);

        let err = DownloadError::HttpStatus { url: "https://x".into(), status: 404 };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn invalid_url_carries_suggestion() {
        let parse_error = url::Url::parse("not a url").unwrap_err();
        let err = DownloadError::invalid_url("not a url", parse_error);
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("absolute"));
    }
}
