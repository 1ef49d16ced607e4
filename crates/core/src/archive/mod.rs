//! Site backup and restore.

pub mod archiver;
pub mod error;
pub mod format;
pub mod name;

pub use archiver::{
    ArchiveSettings, BackupInfo, ConfirmationToken, RestoreReport, RestoredPartition, SiteArchiver,
};
pub use error::{ArchiveError, BackupFailure};
