//! Download source resolution
//!
//! Turns a catalog URL into the URL that is actually fetched.

pub mod google_drive;

use crate::downloader::core::{DownloadError, Result};

/// Where the bytes for a mod come from
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadSource {
    /// Plain HTTP(S) URL, fetched as-is
    Direct { url: String },
    /// Share link rewritten to a direct-download URL
    GoogleDrive { share_url: String, download_url: String },
}

impl DownloadSource {
    /// Classify `url`
    ///
    /// Folder share links fail with `ManualActionRequired`; anything that is
    /// not an absolute http(s) URL fails with `InvalidUrl`.
    pub fn resolve(url: &str) -> Result<Self> {
        if google_drive::is_folder_link(url) {
            return Err(DownloadError::ManualActionRequired {
                url: url.to_string(),
                instructions: google_drive::folder_instructions(url),
            });
        }

        let parsed = url::Url::parse(url).map_err(|e| DownloadError::invalid_url(url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url, url::ParseError::RelativeUrlWithoutBase));
        }

        if google_drive::is_drive_url(url) {
            Ok(DownloadSource::GoogleDrive {
                share_url: url.to_string(),
                download_url: google_drive::direct_download_url(url),
            })
        } else {
            Ok(DownloadSource::Direct { url: url.to_string() })
        }
    }

    /// URL to issue the GET against
    pub fn fetch_url(&self) -> &str {
        match self {
            DownloadSource::Direct { url } => url,
            DownloadSource::GoogleDrive { download_url, .. } => download_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn folder_links_need_manual_action() {
        let err = DownloadSource::resolve("https://drive.example.com/drive/folders/XYZ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ManualActionRequired);
        assert!(err.to_string().contains("drive/folders/XYZ"));
    }

    #[test]
    fn drive_links_are_rewritten() {
        let source = DownloadSource::resolve("https://drive.google.com/file/d/abc/view").unwrap();
        assert_eq!(source.fetch_url(), "https://drive.google.com/uc?export=download&id=abc");
    }

    #[test]
    fn plain_links_pass_through() {
        let source = DownloadSource::resolve("https://x/a.zip").unwrap();
        assert_eq!(source, DownloadSource::Direct { url: "https://x/a.zip".into() });
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(DownloadSource::resolve("ftp://x/a.zip").is_err());
        assert!(DownloadSource::resolve("a.zip").is_err());
    }
}
