//! Storage contracts consumed by the archiver and the content editors.
//!
//! A [`PartitionStore`] exposes named tables of JSON records; a
//! [`BlobStore`] holds immutable named objects grouped into buckets.
//! Adapters: [`memory`] for tests and dry runs, [`postgres`] for production.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unknown partition `{0}`")]
    UnknownPartition(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("object `{0}` already exists")]
    Collision(String),

    #[error("object `{0}` not found")]
    ObjectNotFound(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A named table of records.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Every record in the partition, unfiltered.
    async fn select_all(&self, partition: &str) -> Result<Vec<Value>, StoreError>;

    async fn delete_all(&self, partition: &str) -> Result<(), StoreError>;

    async fn insert_many(&self, partition: &str, records: &[Value]) -> Result<(), StoreError>;

    /// Insert `record`, or update the existing record whose `conflict_key`
    /// field matches.
    async fn upsert(
        &self,
        partition: &str,
        record: &Value,
        conflict_key: &str,
    ) -> Result<(), StoreError>;

    /// Insert one record, letting the store fill generated columns such as
    /// `id` and `created_at`. Returns the stored record.
    async fn insert_one(&self, partition: &str, record: &Value) -> Result<Value, StoreError>;

    /// Overwrite the given fields of the record whose `id` renders as `id`.
    /// Returns the updated record, or `None` if there is no such record.
    async fn update_by_id(
        &self,
        partition: &str,
        id: &str,
        fields: &Value,
    ) -> Result<Option<Value>, StoreError>;

    /// Delete the record whose `id` renders as `id`; returns whether one existed.
    async fn delete_by_id(&self, partition: &str, id: &str) -> Result<bool, StoreError>;

    /// Delete every record, then insert `records`. Adapters that can do
    /// both in one transaction override this.
    async fn replace_all(&self, partition: &str, records: &[Value]) -> Result<(), StoreError> {
        self.delete_all(partition).await?;
        self.insert_many(partition, records).await
    }

    /// Connectivity check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Bucketed object storage. Objects are write-once.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a new object. Fails with [`StoreError::Collision`] if the name is taken.
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove the named objects. Names that do not exist are skipped; the
    /// names actually removed are returned.
    async fn delete(&self, bucket: &str, names: &[String]) -> Result<Vec<String>, StoreError>;
}

/// The text form of a record id: strings as-is, numbers in decimal.
pub fn id_text(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Run a remote call, turning an expired deadline into [`StoreError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
