//! Pristine copies of the game's own package files
//!
//! Mods overwrite files the game ships with. The first time they are seen,
//! those files are copied into the vanilla store so the game can be put back
//! to its original state independently of per-mod snapshots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::InstallerConfig;
use crate::install::backup::BackupError;
use crate::models::Mod;

pub const VANILLA_MOD_ID: &str = "vanilla_pack";

/// Game files preserved by default, relative to the game path
pub const DEFAULT_VANILLA_FILES: &[&str] = &["data/media.pack", "data/boot.pack"];

/// Script overrides removed on restore, relative to the game path
pub const DEFAULT_VANILLA_SCRIPTS: &[&str] = &["scripts/user.script.txt"];

#[derive(Debug, Clone)]
pub struct VanillaStore {
    game_path: PathBuf,
    store_dir: PathBuf,
    files: Vec<String>,
    scripts: Vec<String>,
}

impl VanillaStore {
    pub fn new<G: Into<PathBuf>, S: Into<PathBuf>>(game_path: G, store_dir: S) -> Self {
        Self {
            game_path: game_path.into(),
            store_dir: store_dir.into(),
            files: DEFAULT_VANILLA_FILES.iter().map(|f| f.to_string()).collect(),
            scripts: DEFAULT_VANILLA_SCRIPTS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn from_config(config: &InstallerConfig) -> Self {
        Self::new(&config.game_path, config.vanilla_dir())
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn live_path(&self, file: &str) -> PathBuf {
        self.game_path.join(file)
    }

    /// `data/media.pack` is stored as `data_media.pack`
    fn stored_path(&self, file: &str) -> PathBuf {
        self.store_dir.join(file.replace(['/', '\\'], "_"))
    }

    /// Copy every vanilla file that has no pristine copy yet
    ///
    /// Existing copies are never overwritten. Returns how many were copied.
    pub fn backup_missing(&self) -> Result<usize, BackupError> {
        fs::create_dir_all(&self.store_dir).map_err(|e| BackupError::FileSystem {
            path: self.store_dir.clone(),
            source: e,
        })?;

        let mut copied = 0;
        for file in &self.files {
            let live = self.live_path(file);
            if !live.is_file() {
                debug!("Vanilla file {} not present", live.display());
                continue;
            }
            let stored = self.stored_path(file);
            if stored.exists() {
                debug!("{} already preserved", file);
                continue;
            }
            fs::copy(&live, &stored).map_err(|e| BackupError::FileSystem { path: live.clone(), source: e })?;
            copied += 1;
        }

        info!("Preserved {} vanilla files in {}", copied, self.store_dir.display());
        Ok(copied)
    }

    /// At least one pristine copy exists
    pub fn is_backed_up(&self) -> bool {
        self.files.iter().any(|file| self.stored_path(file).is_file())
    }

    /// Put every preserved file back and remove the script overrides
    ///
    /// Fails with `NotFound` when there was nothing to restore.
    pub fn restore(&self) -> Result<usize, BackupError> {
        let mut restored = 0;
        for file in &self.files {
            let stored = self.stored_path(file);
            if !stored.is_file() {
                continue;
            }
            let live = self.live_path(file);
            if let Some(parent) = live.parent() {
                fs::create_dir_all(parent).map_err(|e| BackupError::FileSystem {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            fs::copy(&stored, &live).map_err(|e| BackupError::FileSystem { path: live.clone(), source: e })?;
            restored += 1;
        }

        for script in &self.scripts {
            let path = self.live_path(script);
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed script override {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        if restored == 0 {
            return Err(BackupError::NotFound {
                name: VANILLA_MOD_ID.to_string(),
            });
        }
        info!("Restored {} vanilla files", restored);
        Ok(restored)
    }

    /// Synthetic mod entry describing the vanilla files currently present
    pub fn describe(&self) -> Mod {
        let sizes: Vec<u64> = self
            .files
            .iter()
            .filter_map(|file| fs::metadata(self.live_path(file)).ok())
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .collect();

        let name = if sizes.is_empty() {
            "No vanilla files found"
        } else {
            "Vanilla Files"
        };

        let mut m = Mod::new(VANILLA_MOD_ID, "original", "")
            .with_name(name)
            .with_file_size(sizes.iter().sum());
        m.description = format!("Original game files ({} files)", sizes.len());
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, VanillaStore) {
        let dir = tempdir().unwrap();
        let store = VanillaStore::new(dir.path().join("game"), dir.path().join("cache/vanilla"));
        (dir, store)
    }

    fn write(path: PathBuf, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn preserves_once_and_restores() {
        let (dir, store) = setup();
        let game = dir.path().join("game");
        write(game.join("data/media.pack"), b"vanilla media");
        write(game.join("scripts/user.script.txt"), b"mod_a");

        assert!(!store.is_backed_up());
        assert_eq!(store.backup_missing().unwrap(), 1);
        assert!(store.is_backed_up());
        assert!(store.store_dir().join("data_media.pack").is_file());

        write(game.join("data/media.pack"), b"modded media");
        assert_eq!(store.backup_missing().unwrap(), 0);

        assert_eq!(store.restore().unwrap(), 1);
        assert_eq!(fs::read(game.join("data/media.pack")).unwrap(), b"vanilla media");
        assert!(!game.join("scripts/user.script.txt").exists());
    }

    #[tokio::test]
    async fn clearing_the_cache_keeps_pristine_copies() {
        let dir = tempdir().unwrap();
        let mut config = InstallerConfig::default();
        config.set_game_path(dir.path().join("game"));
        config.cache_dir = dir.path().join("cache");
        config.temp_dir = dir.path().join("temp");
        let store = VanillaStore::from_config(&config);
        let media = config.game_path.join("data/media.pack");
        write(media.clone(), b"vanilla");

        store.backup_missing().unwrap();
        write(media.clone(), b"modded");
        crate::downloader::ContentCache::new(&config.cache_dir).clear().await.unwrap();
        assert_eq!(store.backup_missing().unwrap(), 0);

        store.restore().unwrap();
        assert_eq!(fs::read(&media).unwrap(), b"vanilla");
    }

    #[test]
    fn restore_without_copies_is_not_found() {
        let (_dir, store) = setup();
        let err = store.restore().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn describe_sums_present_files() {
        let (dir, store) = setup();
        let game = dir.path().join("game");
        assert_eq!(store.describe().file_size, 0);

        write(game.join("data/media.pack"), &[0u8; 100]);
        write(game.join("data/boot.pack"), &[0u8; 50]);

        let m = store.describe();
        assert_eq!(m.id, VANILLA_MOD_ID);
        assert_eq!(m.version, "original");
        assert_eq!(m.file_size, 150);
        assert_eq!(m.name, "Vanilla Files");
    }
}
