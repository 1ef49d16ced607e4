use thiserror::Error;

use super::format::FormatError;
use crate::store::StoreError;

/// Why a backup run produced no archive.
#[derive(Debug, Error)]
pub enum BackupFailure {
    #[error("no connection to the content store: {0}")]
    NoConnection(StoreError),

    #[error("could not fetch partition `{partition}`: {source}")]
    PartitionFetch {
        partition: String,
        #[source]
        source: StoreError,
    },

    #[error("could not encode archive: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("a backup named `{0}` already exists")]
    UploadCollision(String),

    #[error("upload failed: {0}")]
    Upload(StoreError),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("backup failed: {0}")]
    BackupFailed(#[from] BackupFailure),

    #[error("restore failed at partition `{partition}`: {reason}")]
    RestoreFailed {
        partition: String,
        #[source]
        reason: StoreError,
    },

    #[error("invalid archive format: {0}")]
    InvalidArchiveFormat(#[from] FormatError),

    #[error("backup `{0}` not found")]
    NotFound(String),

    #[error("backup storage unavailable: {0}")]
    ConnectionUnavailable(StoreError),
}

impl ArchiveError {
    /// The partition a failed restore stopped at.
    pub fn partition(&self) -> Option<&str> {
        match self {
            ArchiveError::RestoreFailed { partition, .. } => Some(partition),
            ArchiveError::BackupFailed(BackupFailure::PartitionFetch { partition, .. }) => {
                Some(partition)
            }
            _ => None,
        }
    }
}
