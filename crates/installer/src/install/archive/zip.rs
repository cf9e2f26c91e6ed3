//! ZIP reader

use ::zip::ZipArchive;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use super::{archive_error, ArchiveEntry, ArchiveReader};
use crate::install::error::Result;

/// Index-based reader over a ZIP file
pub struct ZipArchiveReader {
    archive: ZipArchive<BufReader<File>>,
    path: PathBuf,
    next_index: usize,
    current: Option<usize>,
}

impl ZipArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| archive_error(path, e))?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| archive_error(path, e))?;

        Ok(Self {
            archive,
            path: path.to_path_buf(),
            next_index: 0,
            current: None,
        })
    }
}

impl ArchiveReader for ZipArchiveReader {
    fn total_entries(&self) -> Option<usize> {
        Some(self.archive.len())
    }

    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let index = self.next_index;
        if index >= self.archive.len() {
            self.current = None;
            return Ok(None);
        }

        let file = self.archive.by_index(index).map_err(|e| archive_error(&self.path, e))?;
        let entry = ArchiveEntry {
            name: file.name().to_string(),
            is_dir: file.is_dir(),
            mode: file.unix_mode(),
            modified: None,
        };

        self.next_index += 1;
        self.current = Some(index);
        Ok(Some(entry))
    }

    fn unpack_current(&mut self, dest: &Path) -> io::Result<()> {
        let index = self
            .current
            .ok_or_else(|| io::Error::other("no current entry to unpack"))?;
        let mut source = self.archive.by_index(index).map_err(io::Error::other)?;
        let mut out = File::create(dest)?;
        io::copy(&mut source, &mut out)?;
        Ok(())
    }
}
