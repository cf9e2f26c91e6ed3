//! RAR reader
//!
//! `unrar` exposes the archive as a cursor that alternates between "before
//! header" and "before file data". The reader keeps whichever state it is in
//! and steps it forward on demand.

use chrono::{Local, NaiveDate, TimeZone};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use unrar::{Archive, CursorBeforeFile, CursorBeforeHeader, OpenArchive, Process};

use super::{archive_error, ArchiveEntry, ArchiveReader};
use crate::install::error::Result;

/// Mode given to extracted files; RAR headers carry no portable permissions
const DEFAULT_FILE_MODE: u32 = 0o644;

enum Cursor {
    BeforeHeader(OpenArchive<Process, CursorBeforeHeader>),
    BeforeFile(OpenArchive<Process, CursorBeforeFile>),
    Done,
}

/// Streamed reader over a RAR file. The entry count is unknown up front.
pub struct RarArchiveReader {
    cursor: Cursor,
    path: PathBuf,
}

impl RarArchiveReader {
    pub fn open(path: &Path) -> Result<Self> {
        let archive = Archive::new(path)
            .open_for_processing()
            .map_err(|e| archive_error(path, e))?;

        Ok(Self {
            cursor: Cursor::BeforeHeader(archive),
            path: path.to_path_buf(),
        })
    }
}

impl ArchiveReader for RarArchiveReader {
    fn total_entries(&self) -> Option<usize> {
        None
    }

    fn next_entry(&mut self) -> Result<Option<ArchiveEntry>> {
        let archive = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::BeforeHeader(archive) => archive,
            Cursor::BeforeFile(header) => header.skip().map_err(|e| archive_error(&self.path, e))?,
            Cursor::Done => return Ok(None),
        };

        match archive.read_header().map_err(|e| archive_error(&self.path, e))? {
            Some(header) => {
                let file = header.entry();
                let entry = ArchiveEntry {
                    name: file.filename.to_string_lossy().into_owned(),
                    is_dir: file.is_directory(),
                    mode: Some(DEFAULT_FILE_MODE),
                    modified: dos_time(file.file_time),
                };
                self.cursor = Cursor::BeforeFile(header);
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn unpack_current(&mut self, dest: &Path) -> io::Result<()> {
        match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::BeforeFile(header) => {
                let archive = header.extract_to(dest).map_err(io::Error::other)?;
                self.cursor = Cursor::BeforeHeader(archive);
                Ok(())
            }
            other => {
                self.cursor = other;
                Err(io::Error::other("no current entry to unpack"))
            }
        }
    }
}

/// Decode an MS-DOS date/time stamp, interpreted as local time
fn dos_time(value: u32) -> Option<SystemTime> {
    let date = (value >> 16) as u16;
    let time = (value & 0xFFFF) as u16;

    let year = 1980 + i32::from(date >> 9);
    let month = u32::from((date >> 5) & 0x0F);
    let day = u32::from(date & 0x1F);
    let hour = u32::from(time >> 11);
    let minute = u32::from((time >> 5) & 0x3F);
    let second = u32::from(time & 0x1F) * 2;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    Local.from_local_datetime(&naive).earliest().map(SystemTime::from)
}
