//! Installation pipeline
//!
//! Archive extraction, destination routing, snapshots and the sequential
//! batch installer built on top of them.

pub mod archive;
pub mod backup;
pub mod error;
pub mod installer;
pub mod router;
pub mod vanilla;

pub use archive::{extract_archive, ArchiveEntry, ArchiveFormat, ArchiveReader, ExtractObserver, ExtractSummary};
pub use backup::{BackupError, BackupManager};
pub use error::InstallError;
pub use installer::{
    BatchReport, InstallProgress, InstallProgressCallback, InstallState, ModInstaller, ModOutcome,
};
pub use router::{route, DestinationRoot, DestinationRoots};
pub use vanilla::{VanillaStore, VANILLA_MOD_ID};
