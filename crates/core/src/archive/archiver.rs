use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{ArchiveError, BackupFailure};
use super::format::{Archive, PartitionSnapshot};
use super::name::backup_name;
use crate::events::bus::EventBus;
use crate::events::types::{BackupEvent, SiteEvent};
use crate::store::{with_timeout, BlobStore, ObjectInfo, PartitionStore, StoreError};

/// Object some storage consoles create to represent an empty folder.
const FOLDER_PLACEHOLDER: &str = ".emptyFolderPlaceholder";

/// What gets backed up, where archives go, and how long remote calls may take.
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    pub partitions: Vec<String>,
    pub bucket: String,
    pub timeout: Duration,
}

/// A stored backup as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Proof that the operator was shown the risks of restoring a backup.
/// Issued by [`SiteArchiver::request_confirmation`], consumed by
/// [`SiteArchiver::restore_backup`].
#[derive(Debug)]
pub struct ConfirmationToken {
    id: Uuid,
    backup: String,
    description: String,
    issued_at: DateTime<Utc>,
}

impl ConfirmationToken {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn backup(&self) -> &str {
        &self.backup
    }

    /// Operator-facing explanation of what the restore will do.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredPartition {
    pub name: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    pub backup: String,
    pub partitions: Vec<RestoredPartition>,
}

/// Backs up the configured partitions into one JSON object in the blob
/// store and restores them from such objects.
#[derive(Clone)]
pub struct SiteArchiver {
    partitions: Arc<dyn PartitionStore>,
    blobs: Arc<dyn BlobStore>,
    settings: ArchiveSettings,
    events: EventBus,
}

impl SiteArchiver {
    pub fn new(
        partitions: Arc<dyn PartitionStore>,
        blobs: Arc<dyn BlobStore>,
        settings: ArchiveSettings,
    ) -> Self {
        Self {
            partitions,
            blobs,
            settings,
            events: EventBus::default(),
        }
    }

    /// Publish progress on `events` instead of a private bus.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    async fn remote<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        with_timeout(self.settings.timeout, call).await
    }

    /// Snapshot every configured partition into a new backup object.
    ///
    /// Partitions are fetched concurrently; if any fetch fails the whole
    /// backup is abandoned and nothing is uploaded.
    pub async fn create_backup(&self) -> Result<BackupInfo, ArchiveError> {
        match self.try_create_backup().await {
            Ok(info) => {
                tracing::info!(backup = %info.name, partitions = self.settings.partitions.len(), "Backup created");
                self.events.publish(SiteEvent::BackupCreated(BackupEvent {
                    name: info.name.clone(),
                    created_at: info.created_at,
                    partitions: self.settings.partitions.clone(),
                }));
                Ok(info)
            }
            Err(failure) => {
                tracing::error!(error = %failure, "Backup failed");
                self.events.publish(SiteEvent::BackupFailed {
                    reason: failure.to_string(),
                });
                Err(failure.into())
            }
        }
    }

    async fn try_create_backup(&self) -> Result<BackupInfo, BackupFailure> {
        self.remote(self.partitions.ping())
            .await
            .map_err(BackupFailure::NoConnection)?;

        let fetches = self.settings.partitions.iter().map(|name| async move {
            let records = self
                .remote(self.partitions.select_all(name))
                .await
                .map_err(|source| BackupFailure::PartitionFetch {
                    partition: name.clone(),
                    source,
                })?;
            tracing::debug!(partition = %name, records = records.len(), "Partition fetched");
            Ok::<_, BackupFailure>(PartitionSnapshot {
                name: name.clone(),
                records,
            })
        });
        let snapshots = try_join_all(fetches).await?;

        let created_at = Utc::now();
        let bytes = Archive::new(created_at, snapshots).to_bytes()?;
        let name = backup_name(created_at);

        self.remote(self.blobs.upload(&self.settings.bucket, &name, bytes))
            .await
            .map_err(|err| match err {
                StoreError::Collision(existing) => BackupFailure::UploadCollision(existing),
                other => BackupFailure::Upload(other),
            })?;

        Ok(BackupInfo { name, created_at })
    }

    /// Stored backups, newest first, without folder placeholders.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>, ArchiveError> {
        let objects = self
            .remote(self.blobs.list(&self.settings.bucket))
            .await
            .map_err(ArchiveError::ConnectionUnavailable)?;

        let mut backups: Vec<BackupInfo> = objects
            .into_iter()
            .filter(|object| !is_placeholder(object))
            .map(|object| BackupInfo {
                name: object.name,
                created_at: object.created_at,
            })
            .collect();
        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(backups)
    }

    /// First step of a restore: check that `name` exists and describe
    /// what restoring it will do.
    pub async fn request_confirmation(&self, name: &str) -> Result<ConfirmationToken, ArchiveError> {
        self.ensure_listed(name).await?;
        let description = format!(
            "Restoring \"{name}\" deletes and re-inserts every partition stored in it. \
             Partitions are replaced one at a time without a shared transaction, so a \
             failure part-way leaves earlier partitions restored and later ones as they \
             are now. This cannot be undone without another backup."
        );
        Ok(ConfirmationToken {
            id: Uuid::new_v4(),
            backup: name.to_string(),
            description,
            issued_at: Utc::now(),
        })
    }

    /// Replace every partition present in the confirmed backup with its
    /// archived records, one partition at a time.
    ///
    /// The archive is validated in full before any partition is touched.
    /// A failure stops the run; partitions already replaced stay replaced.
    pub async fn restore_backup(
        &self,
        token: ConfirmationToken,
    ) -> Result<RestoreReport, ArchiveError> {
        let backup = token.backup;
        match self.try_restore(&backup).await {
            Ok(report) => {
                tracing::info!(%backup, partitions = report.partitions.len(), "Restore completed");
                self.events.publish(SiteEvent::RestoreCompleted { backup });
                Ok(report)
            }
            Err(err) => {
                tracing::error!(%backup, partition = ?err.partition(), error = %err, "Restore failed");
                self.events.publish(SiteEvent::RestoreFailed {
                    backup,
                    partition: err.partition().map(str::to_string),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn try_restore(&self, backup: &str) -> Result<RestoreReport, ArchiveError> {
        let archive = self.load_archive(backup).await?;

        tracing::info!(%backup, partitions = ?archive.partition_names(), "Restore started");
        self.events.publish(SiteEvent::RestoreStarted {
            backup: backup.to_string(),
        });

        let mut restored = Vec::with_capacity(archive.partitions.len());
        for snapshot in archive.partitions {
            self.remote(
                self.partitions
                    .replace_all(&snapshot.name, &snapshot.records),
            )
            .await
            .map_err(|reason| ArchiveError::RestoreFailed {
                partition: snapshot.name.clone(),
                reason,
            })?;

            tracing::info!(%backup, partition = %snapshot.name, records = snapshot.records.len(), "Partition restored");
            self.events.publish(SiteEvent::PartitionRestored {
                backup: backup.to_string(),
                partition: snapshot.name.clone(),
                records: snapshot.records.len(),
            });
            restored.push(RestoredPartition {
                name: snapshot.name,
                records: snapshot.records.len(),
            });
        }

        Ok(RestoreReport {
            backup: backup.to_string(),
            partitions: restored,
        })
    }

    /// Download, parse and validate a listed backup.
    async fn load_archive(&self, name: &str) -> Result<Archive, ArchiveError> {
        self.ensure_listed(name).await?;
        let bytes = self
            .remote(self.blobs.download(&self.settings.bucket, name))
            .await
            .map_err(|err| match err {
                StoreError::ObjectNotFound(_) => ArchiveError::NotFound(name.to_string()),
                other => ArchiveError::ConnectionUnavailable(other),
            })?;

        let archive = Archive::from_slice(&bytes)?;
        archive.ensure_partitions_within(&self.settings.partitions)?;
        Ok(archive)
    }

    async fn ensure_listed(&self, name: &str) -> Result<(), ArchiveError> {
        let listed = self.list_backups().await?;
        if listed.iter().any(|b| b.name == name) {
            Ok(())
        } else {
            Err(ArchiveError::NotFound(name.to_string()))
        }
    }
}

fn is_placeholder(object: &ObjectInfo) -> bool {
    object.size == 0 || object.name.ends_with('/') || object.name == FOLDER_PLACEHOLDER
}
