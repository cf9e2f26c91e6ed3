//! Mod installer library
//!
//! Downloads mod archives into a content-addressed cache, snapshots the
//! game's destination folders, and extracts archives into the data and
//! scripts roots with path traversal protection.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mod_installer::{InstallerConfig, JsonFileCatalog, ModCatalog, ModInstaller};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = InstallerConfig::load(&InstallerConfig::default_path())?;
//! let catalog = JsonFileCatalog::new("mods.json");
//! let mods = catalog.select(&["ntw_fcn".to_string()]).await?;
//!
//! let installer = ModInstaller::new(config)?;
//! let report = installer.install_batch(&mods, &CancellationToken::new()).await?;
//! for outcome in &report.outcomes {
//!     println!("{}: {}", outcome.mod_name, outcome.state);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod downloader;
pub mod error;
pub mod install;
pub mod models;

pub use catalog::{CatalogError, JsonFileCatalog, MetaTreeCatalog, ModCatalog};
pub use config::{BackupPolicy, InstallerConfig};
pub use downloader::{
    ContentCache, DownloadConfig, DownloadError, DownloadSource, HttpDownloader, ProgressCallback, ProgressEvent,
};
pub use error::ErrorKind;
pub use install::{
    BackupError, BackupManager, BatchReport, InstallError, InstallProgress, InstallProgressCallback, InstallState,
    ModInstaller, ModOutcome, VanillaStore,
};
pub use models::Mod;
