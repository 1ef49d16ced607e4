use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator notifications emitted by backup and restore runs and by record
/// and image edits, consumed by SSE listeners and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SiteEvent {
    Welcome,
    BackupCreated(BackupEvent),
    BackupFailed { reason: String },
    RestoreStarted { backup: String },
    #[serde(rename_all = "camelCase")]
    PartitionRestored { backup: String, partition: String, records: usize },
    RestoreCompleted { backup: String },
    RestoreFailed {
        backup: String,
        partition: Option<String>,
        reason: String,
    },
    RecordSaved { partition: String, id: String },
    RecordDeleted { partition: String, id: String },
    ImageUploaded { path: String },
    ImagesDeleted { paths: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEvent {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub partitions: Vec<String>,
}
