//! Installer configuration
//!
//! Path settings and install options, persisted as JSON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What to do when the pre-install snapshot cannot be taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupPolicy {
    /// Log a warning and install without a snapshot
    #[default]
    BestEffort,
    /// Fail the mod before anything is downloaded or extracted
    Required,
}

/// Installation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerConfig {
    /// Game installation directory; the data root is `<game_path>/data`
    pub game_path: PathBuf,
    /// Destination root for script files
    pub scripts_path: PathBuf,
    /// Directory holding cached archives
    pub cache_dir: PathBuf,
    /// Working directory for partial downloads, backups and vanilla copies
    pub temp_dir: PathBuf,
    pub verify_checksums: bool,
    pub create_backups: bool,
    /// Reserved; batches are processed sequentially
    pub max_concurrent_downloads: usize,
    pub backup_policy: BackupPolicy,
    /// Keep at most this many snapshots per mod, never fewer than one. `None`
    /// keeps everything.
    pub backup_retention: Option<usize>,
}

fn default_base_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("mod-installer"))
        .unwrap_or_else(|| std::env::temp_dir().join("mod-installer-cache"))
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let base = default_base_dir();

        Self {
            game_path: home.clone(),
            scripts_path: home,
            cache_dir: base.join("mods"),
            temp_dir: base.join("temp"),
            verify_checksums: true,
            create_backups: true,
            max_concurrent_downloads: 3,
            backup_policy: BackupPolicy::BestEffort,
            backup_retention: None,
        }
    }
}

impl InstallerConfig {
    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        default_base_dir().join("config.json")
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Persist configuration as pretty JSON
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, data)
    }

    /// Point at a new game directory; the scripts path follows it
    pub fn set_game_path<P: Into<PathBuf>>(&mut self, path: P) {
        self.game_path = path.into();
        self.scripts_path = self.game_path.join("scripts");
    }

    pub fn data_root(&self) -> PathBuf {
        self.game_path.join("data")
    }

    pub fn scripts_root(&self) -> PathBuf {
        self.scripts_path.clone()
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.temp_dir.join("backups")
    }

    /// Kept outside `cache_dir` so clearing the cache never drops pristine copies
    pub fn vanilla_dir(&self) -> PathBuf {
        self.temp_dir.join("vanilla")
    }

    /// Create the working directories and the scripts root
    ///
    /// The data root is left alone: its absence means the game path is wrong.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [&self.cache_dir, &self.temp_dir, &self.scripts_path] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
