//! Sequential mod installer
//!
//! Each mod runs `Validating → BackingUp → Downloading → Extracting →
//! Completed`, dropping to `Failed` on the first error. A failed mod never
//! stops the rest of the batch.
//!
//! # Example
//!
//! ```rust,no_run
//! use mod_installer::{InstallerConfig, ModInstaller, Mod};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), mod_installer::InstallError> {
//! let mut config = InstallerConfig::default();
//! config.set_game_path("/games/Napoleon Total War");
//!
//! let installer = ModInstaller::new(config)?;
//! let mods = vec![Mod::new("ntw_fcn", "1.0", "https://example.com/fcn.zip")];
//!
//! let report = installer.install_batch(&mods, &CancellationToken::new()).await?;
//! println!("{} installed, {} failed", report.succeeded(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{BackupPolicy, InstallerConfig};
use crate::downloader::{DownloadConfig, HttpDownloader, ProgressCallback, ProgressEvent};
use crate::error::ErrorKind;
use crate::install::archive::{extract_archive, ExtractSummary};
use crate::install::backup::BackupManager;
use crate::install::error::{InstallError, Result};
use crate::install::router::DestinationRoots;
use crate::install::vanilla::VanillaStore;
use crate::models::Mod;

/// Per-mod pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallState {
    Pending,
    Validating,
    BackingUp,
    Downloading,
    Extracting,
    Completed,
    Failed,
}

impl InstallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstallState::Completed | InstallState::Failed)
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstallState::Pending => "pending",
            InstallState::Validating => "validating",
            InstallState::BackingUp => "backing up",
            InstallState::Downloading => "downloading",
            InstallState::Extracting => "extracting",
            InstallState::Completed => "completed",
            InstallState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Progress of the mod currently being installed
#[derive(Debug, Clone, PartialEq)]
pub struct InstallProgress {
    pub mod_id: String,
    pub state: InstallState,
    /// Bytes while downloading, entries while extracting
    pub processed: u64,
    /// 0 when unknown
    pub total: u64,
    pub current_item: String,
}

/// Progress callback type for installation updates
pub type InstallProgressCallback = Arc<dyn Fn(InstallProgress) + Send + Sync>;

/// Final result for one mod of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct ModOutcome {
    pub mod_id: String,
    pub mod_name: String,
    pub state: InstallState,
    /// Human readable cause, including the error's source chain
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// Snapshot taken before installing
    pub backup: Option<String>,
    /// Cached archive that was extracted
    pub archive: Option<PathBuf>,
    pub warnings: Vec<String>,
}

impl ModOutcome {
    fn pending(m: &Mod) -> Self {
        Self {
            mod_id: m.id.clone(),
            mod_name: m.display_name().to_string(),
            state: InstallState::Pending,
            error: None,
            error_kind: None,
            backup: None,
            archive: None,
            warnings: Vec::new(),
        }
    }

    fn fail(&mut self, error: &InstallError) {
        self.state = InstallState::Failed;
        self.error = Some(error_chain(error));
        self.error_kind = Some(error.kind());
    }

    pub fn is_success(&self) -> bool {
        self.state == InstallState::Completed
    }
}

/// Outcomes of a batch, in selection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<ModOutcome>,
    /// The cancellation token fired before every mod finished
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == InstallState::Failed)
            .count()
    }

    pub fn is_complete_success(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded() == self.outcomes.len()
    }

    pub fn is_total_failure(&self) -> bool {
        !self.outcomes.is_empty() && self.succeeded() == 0
    }

    /// Some mods succeeded and some did not
    pub fn is_partial(&self) -> bool {
        let succeeded = self.succeeded();
        succeeded > 0 && succeeded < self.outcomes.len()
    }
}

fn error_chain(error: &InstallError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn join_error(error: tokio::task::JoinError) -> InstallError {
    InstallError::Io(std::io::Error::other(error))
}

/// Clears the in-flight flag when the batch ends, however it ends
struct BatchGuard<'a>(&'a AtomicBool);

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives download, backup and extraction for a batch of mods
pub struct ModInstaller {
    config: InstallerConfig,
    roots: DestinationRoots,
    downloader: HttpDownloader,
    backups: BackupManager,
    vanilla: VanillaStore,
    progress_callback: Option<InstallProgressCallback>,
    in_flight: AtomicBool,
}

impl ModInstaller {
    pub fn new(config: InstallerConfig) -> Result<Self> {
        let downloader = HttpDownloader::new(DownloadConfig::from(&config))?;

        Ok(Self {
            roots: DestinationRoots::new(config.data_root(), config.scripts_root()),
            backups: BackupManager::from_config(&config),
            vanilla: VanillaStore::from_config(&config),
            downloader,
            config,
            progress_callback: None,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Replace the downloader, e.g. to change timeouts
    pub fn with_downloader(mut self, downloader: HttpDownloader) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_progress_callback(mut self, callback: InstallProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn roots(&self) -> &DestinationRoots {
        &self.roots
    }

    pub fn downloader(&self) -> &HttpDownloader {
        &self.downloader
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn vanilla(&self) -> &VanillaStore {
        &self.vanilla
    }

    /// Structural check of the destination roots, done before any mutation
    pub fn validate_environment(&self) -> Result<()> {
        let data = &self.roots.data;
        let named_data = data
            .file_name()
            .is_some_and(|name| name.eq_ignore_ascii_case("data"));
        if !named_data {
            return Err(InstallError::InvalidEnvironment {
                path: data.clone(),
                reason: "data root must be the game's data directory".to_string(),
            });
        }

        for (root, label) in [(data, "data"), (&self.roots.scripts, "scripts")] {
            if !root.is_dir() {
                return Err(InstallError::InvalidEnvironment {
                    path: root.clone(),
                    reason: format!("{} directory does not exist", label),
                });
            }
        }
        Ok(())
    }

    /// Install `mods` one after another
    ///
    /// Fails only when another batch is already running; per-mod failures are
    /// reported in the returned [`BatchReport`].
    pub async fn install_batch(&self, mods: &[Mod], cancel: &CancellationToken) -> Result<BatchReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(InstallError::BatchInProgress);
        }
        let _guard = BatchGuard(&self.in_flight);

        info!("Installing batch of {} mods", mods.len());
        let mut report = BatchReport {
            outcomes: mods.iter().map(ModOutcome::pending).collect(),
            cancelled: false,
        };

        for (index, m) in mods.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let outcome = self.install_mod(m, cancel).await;
            let was_cancelled = outcome.error_kind == Some(ErrorKind::Cancelled);
            report.outcomes[index] = outcome;
            if was_cancelled {
                report.cancelled = true;
                break;
            }
        }

        info!(
            "Batch finished: {} succeeded, {} failed{}",
            report.succeeded(),
            report.failed(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        Ok(report)
    }

    /// Run the full pipeline for one mod
    pub async fn install_mod(&self, m: &Mod, cancel: &CancellationToken) -> ModOutcome {
        let mut outcome = ModOutcome::pending(m);

        async {
            match self.run_pipeline(m, cancel, &mut outcome).await {
                Ok(summary) => {
                    outcome.state = InstallState::Completed;
                    self.report(m, InstallState::Completed, summary.files as u64, summary.files as u64, "");
                    info!("Installed {} ({} files)", m.display_name(), summary.files);
                }
                Err(e) => {
                    let e = e.normalize();
                    warn!("Installing {} failed: {}", m.display_name(), e);
                    outcome.fail(&e);
                    self.report(m, InstallState::Failed, 0, 0, &e.to_string());
                }
            }
        }
        .instrument(info_span!("install_mod", mod_id = %m.id, version = %m.version))
        .await;

        outcome
    }

    async fn run_pipeline(&self, m: &Mod, cancel: &CancellationToken, outcome: &mut ModOutcome) -> Result<ExtractSummary> {
        self.enter(m, outcome, InstallState::Validating);
        self.validate_environment()?;
        Self::check_cancelled(cancel)?;

        self.enter(m, outcome, InstallState::BackingUp);
        self.take_backups(m, outcome).await?;
        Self::check_cancelled(cancel)?;

        self.enter(m, outcome, InstallState::Downloading);
        let archive = self
            .downloader
            .download(m, cancel, Some(self.download_progress(m)))
            .await?;
        outcome.archive = Some(archive.clone());

        self.enter(m, outcome, InstallState::Extracting);
        let roots = self.roots.clone();
        let token = cancel.clone();
        let callback = self.progress_callback.clone();
        let mod_id = m.id.clone();

        tokio::task::spawn_blocking(move || {
            let observer = |name: &str, processed: usize, total: usize| {
                if let Some(callback) = &callback {
                    callback(InstallProgress {
                        mod_id: mod_id.clone(),
                        state: InstallState::Extracting,
                        processed: processed as u64,
                        total: total as u64,
                        current_item: name.to_string(),
                    });
                }
            };
            extract_archive(&archive, &roots, &token, &observer)
        })
        .await
        .map_err(join_error)?
    }

    async fn take_backups(&self, m: &Mod, outcome: &mut ModOutcome) -> Result<()> {
        if !self.backups.is_enabled() {
            return Ok(());
        }

        let vanilla = self.vanilla.clone();
        match tokio::task::spawn_blocking(move || vanilla.backup_missing())
            .await
            .map_err(join_error)?
        {
            Ok(copied) if copied > 0 => debug!("Preserved {} vanilla files", copied),
            Ok(_) => {}
            Err(e) => {
                warn!("Preserving vanilla files failed: {}", e);
                outcome.warnings.push(format!("vanilla files not preserved: {}", e));
            }
        }

        let backups = self.backups.clone();
        let target = m.clone();
        let result = tokio::task::spawn_blocking(move || backups.create_backup(&target))
            .await
            .map_err(join_error)?;

        match result {
            Ok(name) => {
                outcome.backup = name;
                Ok(())
            }
            Err(e) if self.config.backup_policy == BackupPolicy::BestEffort => {
                warn!("Backup before installing {} failed, continuing without one: {}", m.id, e);
                outcome.warnings.push(format!("no backup taken: {}", e));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            Err(InstallError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn enter(&self, m: &Mod, outcome: &mut ModOutcome, state: InstallState) {
        debug!("{}: {} -> {}", m.id, outcome.state, state);
        outcome.state = state;
        self.report(m, state, 0, 0, m.display_name());
    }

    fn report(&self, m: &Mod, state: InstallState, processed: u64, total: u64, current_item: &str) {
        if let Some(callback) = &self.progress_callback {
            callback(InstallProgress {
                mod_id: m.id.clone(),
                state,
                processed,
                total,
                current_item: current_item.to_string(),
            });
        }
    }

    /// Map downloader events onto [`InstallProgress`]
    fn download_progress(&self, m: &Mod) -> ProgressCallback {
        let callback = self.progress_callback.clone();
        let mod_id = m.id.clone();

        Arc::new(move |event: ProgressEvent| {
            if let ProgressEvent::Warning { message, .. } = &event {
                warn!("{}: {}", mod_id, message);
            }
            let (Some(callback), Some((processed, total))) = (&callback, event.byte_counters()) else {
                return;
            };
            let current_item = match &event {
                ProgressEvent::CacheHit { path, .. } => path.clone(),
                ProgressEvent::DownloadProgress { url, .. } | ProgressEvent::DownloadComplete { url, .. } => url.clone(),
                _ => String::new(),
            };
            callback(InstallProgress {
                mod_id: mod_id.clone(),
                state: InstallState::Downloading,
                processed,
                total,
                current_item,
            });
        })
    }
}
