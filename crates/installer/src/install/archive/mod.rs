//! Archive extraction
//!
//! Both container formats sit behind [`ArchiveReader`]; routing, the
//! traversal check and file creation are done once in [`extract`].

pub mod paths;
pub mod rar;
pub mod zip;

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::install::error::{InstallError, Result};
use crate::install::router::DestinationRoots;
pub use self::paths::resolve_entry_path;
pub use self::rar::RarArchiveReader;
pub use self::zip::ZipArchiveReader;

/// Supported container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Indexed format, entry count known up front
    Zip,
    /// Streamed format, entries discovered one header at a time
    Rar,
}

impl ArchiveFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "rar" => Ok(ArchiveFormat::Rar),
            _ => Err(InstallError::UnsupportedFormat { extension }),
        }
    }
}

/// One item of an opened archive. The name is untrusted.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub is_dir: bool,
    /// Unix permission bits declared by the archive
    pub mode: Option<u32>,
    pub modified: Option<SystemTime>,
}

/// Sequential access to the entries of an archive
pub trait ArchiveReader {
    /// Number of entries, when the format knows it before reading them
    fn total_entries(&self) -> Option<usize>;

    /// Advance to the next entry, skipping the data of the current one
    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>>;

    /// Stream the current entry's bytes into `dest`, creating or truncating it
    fn unpack_current(&mut self, dest: &Path) -> io::Result<()>;
}

/// Per-entry progress notification, invoked inline before each entry
pub trait ExtractObserver {
    fn on_entry(&self, name: &str, processed: usize, total: usize);
}

impl<F> ExtractObserver for F
where
    F: Fn(&str, usize, usize),
{
    fn on_entry(&self, name: &str, processed: usize, total: usize) {
        self(name, processed, total)
    }
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl ExtractObserver for NoopObserver {
    fn on_entry(&self, _name: &str, _processed: usize, _total: usize) {}
}

/// What an extraction pass wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
}

/// Extract every entry of `reader` into the routed destination roots
///
/// Cancellation is checked before each entry. Entries already written stay
/// in place on cancellation or failure.
pub fn extract<R>(
    reader: &mut R,
    roots: &DestinationRoots,
    cancel: &CancellationToken,
    observer: &dyn ExtractObserver,
) -> Result<ExtractSummary>
where
    R: ArchiveReader + ?Sized,
{
    let total = reader.total_entries().unwrap_or(0);
    let mut summary = ExtractSummary::default();
    let mut processed = 0usize;

    loop {
        if cancel.is_cancelled() {
            debug!("Extraction cancelled after {} entries", processed);
            return Err(InstallError::Cancelled);
        }

        let Some(entry) = reader.next_entry()? else {
            break;
        };

        observer.on_entry(&entry.name, processed, total);

        let root = roots.root_for(&entry.name);
        let dest = resolve_entry_path(root, &entry.name)?;
        let entry_error = |source: io::Error| InstallError::Entry {
            name: entry.name.clone(),
            source,
        };

        if entry.is_dir {
            fs::create_dir_all(&dest).map_err(entry_error)?;
            summary.directories += 1;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(entry_error)?;
            }
            reader.unpack_current(&dest).map_err(entry_error)?;
            apply_metadata(&dest, &entry).map_err(entry_error)?;
            summary.files += 1;
        }

        processed += 1;
    }

    Ok(summary)
}

/// Open `archive_path` with the reader matching its extension and extract it
pub fn extract_archive(
    archive_path: &Path,
    roots: &DestinationRoots,
    cancel: &CancellationToken,
    observer: &dyn ExtractObserver,
) -> Result<ExtractSummary> {
    let format = ArchiveFormat::from_path(archive_path)?;
    info!("Extracting {} ({:?})", archive_path.display(), format);

    let summary = match format {
        ArchiveFormat::Zip => extract(&mut ZipArchiveReader::open(archive_path)?, roots, cancel, observer)?,
        ArchiveFormat::Rar => extract(&mut RarArchiveReader::open(archive_path)?, roots, cancel, observer)?,
    };

    info!(
        "Extracted {} files and {} directories from {}",
        summary.files,
        summary.directories,
        archive_path.display()
    );
    Ok(summary)
}

fn apply_metadata(dest: &Path, entry: &ArchiveEntry) -> io::Result<()> {
    #[cfg(unix)]
    if let Some(mode) = entry.mode {
        use std::os::unix::fs::PermissionsExt;
        // owner write kept so a reinstall can truncate the file
        fs::set_permissions(dest, fs::Permissions::from_mode((mode & 0o777) | 0o200))?;
    }

    if let Some(modified) = entry.modified {
        File::options().write(true).open(dest)?.set_modified(modified)?;
    }
    Ok(())
}

pub(crate) fn archive_error(path: &Path, error: impl std::fmt::Display) -> InstallError {
    InstallError::Archive {
        path: PathBuf::from(path),
        message: error.to_string(),
    }
}
