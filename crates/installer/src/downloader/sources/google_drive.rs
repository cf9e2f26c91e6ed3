//! Google Drive share links
//!
//! Single-file share links are rewritten to the direct-download endpoint.
//! Folder links can't be fetched as one byte stream and need the user.

use once_cell::sync::Lazy;
use regex::Regex;

const DIRECT_DOWNLOAD: &str = "https://drive.google.com/uc?export=download&id=";

static FILE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"/file/d/([a-zA-Z0-9_-]+)", r"[?&]id=([a-zA-Z0-9_-]+)", r"/d/([a-zA-Z0-9_-]+)"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Drive or Docs hosted link
pub fn is_drive_url(url: &str) -> bool {
    url.contains("drive.google.com") || url.contains("docs.google.com")
}

/// Folder share link
///
/// Any `/drive/folders/` path counts, as does a Drive URL mentioning folders.
pub fn is_folder_link(url: &str) -> bool {
    url.contains("/drive/folders/") || (url.contains("drive.google.com") && url.contains("folders"))
}

/// Extract the file id from a single-file share link
pub fn extract_file_id(url: &str) -> Option<&str> {
    FILE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str())
}

/// Direct-download URL for a share link, or the input unchanged when no id
/// can be found
pub fn direct_download_url(url: &str) -> String {
    match extract_file_id(url) {
        Some(id) => format!("{}{}", DIRECT_DOWNLOAD, id),
        None => url.to_string(),
    }
}

/// Steps shown to the user for a folder link
pub fn folder_instructions(url: &str) -> String {
    format!(
        "shared folders cannot be downloaded directly. \
         1. Open {} \
         2. Select everything (Ctrl+A) \
         3. Right click > Download \
         4. Install the resulting ZIP manually",
        url
    )
}
