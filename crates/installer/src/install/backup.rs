//! Snapshot and restore of the destination roots
//!
//! A snapshot is a plain directory copy at `<backup_dir>/<name>/{data,scripts}`.
//! Restoring replaces each live root wholesale with its snapshot subtree, so
//! an interrupted restore can leave a root half copied.

use chrono::{Local, NaiveDateTime};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::InstallerConfig;
use crate::error::ErrorKind;
use crate::install::router::DestinationRoots;
use crate::models::Mod;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const DATA_SUBTREE: &str = "data";
const SCRIPTS_SUBTREE: &str = "scripts";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Backup I/O failed on '{path}'")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Backup '{name}' not found")]
    NotFound { name: String },

    /// Name is not a single plain path component
    #[error("Invalid backup name '{name}'")]
    InvalidName { name: String },
}

pub type Result<T> = std::result::Result<T, BackupError>;

impl BackupError {
    fn io(path: &Path, source: io::Error) -> Self {
        BackupError::FileSystem {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BackupError::FileSystem { .. } => ErrorKind::BackupFailure,
            BackupError::NotFound { .. } => ErrorKind::NotFound,
            BackupError::InvalidName { .. } => ErrorKind::Configuration,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            BackupError::FileSystem { .. } => "backup_io",
            BackupError::NotFound { .. } => "backup_not_found",
            BackupError::InvalidName { .. } => "backup_invalid_name",
        }
    }
}

/// Timestamp embedded in a snapshot name, ignoring any `-N` suffix
pub fn snapshot_timestamp(name: &str) -> Option<NaiveDateTime> {
    snapshot_order(name).map(|(stamp, _)| stamp)
}

/// `(timestamp, sequence)` used to sort snapshots of one mod
fn snapshot_order(name: &str) -> Option<(NaiveDateTime, u32)> {
    if let Some(stamp) = parse_tail(name) {
        return Some((stamp, 0));
    }
    let (base, seq) = name.rsplit_once('-')?;
    let seq = seq.parse().ok()?;
    parse_tail(base).map(|stamp| (stamp, seq))
}

fn parse_tail(name: &str) -> Option<NaiveDateTime> {
    let split = name.len().checked_sub(TIMESTAMP_LEN)?;
    let (head, tail) = (name.get(..split)?, name.get(split..)?);
    if !head.ends_with('_') {
        return None;
    }
    NaiveDateTime::parse_from_str(tail, TIMESTAMP_FORMAT).ok()
}

fn sanitize(value: &str) -> String {
    value.replace(['/', '\\'], "_")
}

fn snapshot_prefix(m: &Mod) -> String {
    format!("{}_{}_", sanitize(&m.id), sanitize(&m.version))
}

fn validate_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(()),
        _ => Err(BackupError::InvalidName { name: name.to_string() }),
    }
}

/// Copy `src` into `dst` recursively. Permissions are carried by `fs::copy`.
fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    let mut copied = 0u64;
    fs::create_dir_all(dst).map_err(|e| BackupError::io(dst, e))?;

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            BackupError::FileSystem {
                path,
                source: e.into(),
            }
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| BackupError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            copied += fs::copy(entry.path(), &target).map_err(|e| BackupError::io(entry.path(), e))?;
        } else {
            debug!("Skipping non-regular file {}", entry.path().display());
        }
    }

    Ok(copied)
}

fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BackupError::io(path, e)),
    }
}

/// Creates, lists, restores and deletes snapshots of the destination roots
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
    roots: DestinationRoots,
    enabled: bool,
    retention: Option<usize>,
}

impl BackupManager {
    pub fn new<P: Into<PathBuf>>(backup_dir: P, roots: DestinationRoots) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            roots,
            enabled: true,
            retention: None,
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(
            config.backup_dir(),
            DestinationRoots::new(config.data_root(), config.scripts_root()),
        )
        .with_enabled(config.create_backups)
        .with_retention(config.backup_retention)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Keep at most `keep` snapshots per mod version; `None` never prunes
    ///
    /// The newest snapshot is always kept, so `Some(0)` behaves as `Some(1)`.
    pub fn with_retention(mut self, keep: Option<usize>) -> Self {
        self.retention = keep.map(|keep| keep.max(1));
        self
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Snapshot both roots before installing `m`
    ///
    /// Returns the snapshot name, or `None` when backups are disabled. A
    /// root that does not exist yet is skipped.
    pub fn create_backup(&self, m: &Mod) -> Result<Option<String>> {
        if !self.enabled {
            return Ok(None);
        }
        self.create_backup_at(m, Local::now().naive_local()).map(Some)
    }

    pub(crate) fn create_backup_at(&self, m: &Mod, stamp: NaiveDateTime) -> Result<String> {
        fs::create_dir_all(&self.backup_dir).map_err(|e| BackupError::io(&self.backup_dir, e))?;

        let base = format!("{}{}", snapshot_prefix(m), stamp.format(TIMESTAMP_FORMAT));
        let (name, path) = self.reserve_name(&base)?;

        let mut copied = 0u64;
        for (subtree, root) in [(DATA_SUBTREE, &self.roots.data), (SCRIPTS_SUBTREE, &self.roots.scripts)] {
            if !root.is_dir() {
                debug!("{} does not exist, nothing to back up", root.display());
                continue;
            }
            match copy_tree(root, &path.join(subtree)) {
                Ok(bytes) => copied += bytes,
                Err(e) => {
                    if let Err(cleanup) = remove_tree(&path) {
                        warn!("Failed to remove partial backup {}: {}", path.display(), cleanup);
                    }
                    return Err(e);
                }
            }
        }
        info!("Created backup {} ({} bytes)", name, copied);

        if let Some(keep) = self.retention {
            if let Err(e) = self.prune(m, keep) {
                warn!("Backup retention for {} failed: {}", m.id, e);
            }
        }

        Ok(name)
    }

    /// Create `<backup_dir>/<base>` or the first free `<base>-N`
    fn reserve_name(&self, base: &str) -> Result<(String, PathBuf)> {
        let mut seq = 0u32;
        loop {
            let name = if seq == 0 {
                base.to_string()
            } else {
                format!("{}-{}", base, seq)
            };
            let path = self.backup_dir.join(&name);
            match fs::create_dir(&path) {
                Ok(()) => return Ok((name, path)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(BackupError::io(&path, e)),
            }
        }
    }

    /// All snapshot names, oldest first when timestamps are readable
    pub fn list_backups(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackupError::io(&self.backup_dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BackupError::io(&self.backup_dir, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort_by(|a, b| snapshot_order(a).cmp(&snapshot_order(b)).then_with(|| a.cmp(b)));
        Ok(names)
    }

    /// Replace the live roots with the contents of snapshot `name`
    pub fn restore_backup(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let snapshot = self.backup_dir.join(name);
        if !snapshot.is_dir() {
            return Err(BackupError::NotFound { name: name.to_string() });
        }

        for (subtree, root) in [(DATA_SUBTREE, &self.roots.data), (SCRIPTS_SUBTREE, &self.roots.scripts)] {
            let source = snapshot.join(subtree);
            if !source.is_dir() {
                continue;
            }
            remove_tree(root)?;
            copy_tree(&source, root)?;
            debug!("Restored {} from {}", root.display(), source.display());
        }

        info!("Restored backup {}", name);
        Ok(())
    }

    /// Delete snapshot `name`. Deleting a missing snapshot succeeds.
    pub fn delete_backup(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        remove_tree(&self.backup_dir.join(name))?;
        info!("Deleted backup {}", name);
        Ok(())
    }

    /// Delete the oldest snapshots of `m` beyond `keep`, returning their names
    ///
    /// At least the newest snapshot survives.
    pub fn prune(&self, m: &Mod, keep: usize) -> Result<Vec<String>> {
        let keep = keep.max(1);
        let prefix = snapshot_prefix(m);
        let mut owned: Vec<(NaiveDateTime, u32, String)> = self
            .list_backups()?
            .into_iter()
            .filter_map(|name| {
                let rest = name.strip_prefix(&prefix)?;
                let (stamp, seq) = match rest.split_once('-') {
                    Some((stamp, seq)) => (stamp, seq.parse().ok()?),
                    None => (rest, 0),
                };
                let stamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
                Some((stamp, seq, name))
            })
            .collect();

        if owned.len() <= keep {
            return Ok(Vec::new());
        }
        owned.sort();
        let excess = owned.len() - keep;

        let mut removed = Vec::with_capacity(excess);
        for (_, _, name) in owned.into_iter().take(excess) {
            self.delete_backup(&name)?;
            removed.push(name);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, BackupManager) {
        let dir = tempdir().unwrap();
        let roots = DestinationRoots::new(dir.path().join("game/data"), dir.path().join("scripts"));
        let manager = BackupManager::new(dir.path().join("temp/backups"), roots);
        (dir, manager)
    }

    fn stamp(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, second)
            .unwrap()
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn backup_mutate_restore_round_trip() {
        let (_dir, manager) = setup();
        let data = manager.roots.data.clone();
        let scripts = manager.roots.scripts.clone();
        write(&data.join("a.pack"), "original pack");
        write(&data.join("sub/b.pack"), "nested");
        write(&scripts.join("user.script.txt"), "mod a");

        let name = manager.create_backup(&Mod::new("m1", "1.0", "u")).unwrap().unwrap();

        write(&data.join("a.pack"), "overwritten");
        write(&data.join("new.pack"), "added by install");
        fs::remove_file(scripts.join("user.script.txt")).unwrap();

        manager.restore_backup(&name).unwrap();

        assert_eq!(fs::read_to_string(data.join("a.pack")).unwrap(), "original pack");
        assert_eq!(fs::read_to_string(data.join("sub/b.pack")).unwrap(), "nested");
        assert_eq!(fs::read_to_string(scripts.join("user.script.txt")).unwrap(), "mod a");
        assert!(!data.join("new.pack").exists());
    }

    #[test]
    fn missing_roots_are_skipped() {
        let (_dir, manager) = setup();
        let name = manager.create_backup(&Mod::new("m1", "1.0", "u")).unwrap().unwrap();

        let snapshot = manager.backup_dir().join(&name);
        assert!(snapshot.is_dir());
        assert!(!snapshot.join(DATA_SUBTREE).exists());
    }

    #[test]
    fn disabled_manager_is_a_no_op() {
        let (_dir, manager) = setup();
        let manager = manager.with_enabled(false);
        assert_eq!(manager.create_backup(&Mod::new("m1", "1.0", "u")).unwrap(), None);
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn same_second_snapshots_get_suffixes() {
        let (_dir, manager) = setup();
        let m = Mod::new("ntw/fcn", "1.0", "u");

        let first = manager.create_backup_at(&m, stamp(0)).unwrap();
        let second = manager.create_backup_at(&m, stamp(0)).unwrap();

        assert_eq!(first, "ntw_fcn_1.0_20240501_120000");
        assert_eq!(second, "ntw_fcn_1.0_20240501_120000-1");
        assert_eq!(snapshot_timestamp(&second), Some(stamp(0)));
        assert_eq!(manager.list_backups().unwrap(), vec![first, second]);
    }

    #[test]
    fn restore_unknown_is_not_found() {
        let (_dir, manager) = setup();
        let err = manager.restore_backup("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn names_must_be_single_components() {
        let (_dir, manager) = setup();
        for name in ["../x", "a/b", "", "..", "/abs"] {
            let err = manager.delete_backup(name).unwrap_err();
            assert!(matches!(err, BackupError::InvalidName { .. }), "{name}");
        }
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, manager) = setup();
        let name = manager.create_backup_at(&Mod::new("m1", "1.0", "u"), stamp(1)).unwrap();
        manager.delete_backup(&name).unwrap();
        manager.delete_backup(&name).unwrap();
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn zero_retention_keeps_the_snapshot_just_taken() {
        let (_dir, manager) = setup();
        let manager = manager.with_retention(Some(0));
        let m = Mod::new("m1", "1.0", "u");
        write(&manager.roots.data.join("a.pack"), "before");

        manager.create_backup_at(&m, stamp(0)).unwrap();
        let name = manager.create_backup_at(&m, stamp(1)).unwrap();

        assert_eq!(manager.list_backups().unwrap(), vec![name.clone()]);
        write(&manager.roots.data.join("a.pack"), "after");
        manager.restore_backup(&name).unwrap();
        assert_eq!(fs::read_to_string(manager.roots.data.join("a.pack")).unwrap(), "before");
        assert!(manager.prune(&m, 0).unwrap().is_empty());
    }

    #[test]
    fn retention_keeps_newest_per_mod() {
        let (_dir, manager) = setup();
        let m = Mod::new("m1", "1.0", "u");
        let other = Mod::new("m2", "1.0", "u");

        for second in 0..4 {
            manager.create_backup_at(&m, stamp(second)).unwrap();
        }
        manager.create_backup_at(&other, stamp(0)).unwrap();

        let removed = manager.prune(&m, 2).unwrap();
        assert_eq!(removed, vec!["m1_1.0_20240501_120000", "m1_1.0_20240501_120001"]);

        let left = manager.list_backups().unwrap();
        assert_eq!(left.len(), 3);
        assert!(left.contains(&"m2_1.0_20240501_120000".to_string()));
    }

    #[test]
    fn timestamps_parse_from_names() {
        assert_eq!(snapshot_timestamp("m_1.0_20240501_120003"), Some(stamp(3)));
        assert_eq!(snapshot_timestamp("m_1.0_20240501_120003-7"), Some(stamp(3)));
        assert_eq!(snapshot_timestamp("manual-copy"), None);
    }
}
