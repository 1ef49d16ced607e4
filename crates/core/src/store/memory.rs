//! In-process store adapter.
//!
//! Holds partitions and objects in memory behind async locks. Used by the
//! test suites and by the API when no database is configured for a dry run.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{id_text, BlobStore, ObjectInfo, PartitionStore, StoreError};

/// Which operations an injected fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Reads,
    Writes,
}

#[derive(Debug, Default)]
pub struct MemoryPartitionStore {
    partitions: RwLock<BTreeMap<String, Vec<Value>>>,
    faults: RwLock<HashSet<(String, Fault)>>,
}

impl MemoryPartitionStore {
    /// Create a store with the given empty partitions.
    pub fn new<I, S>(partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            partitions: RwLock::new(
                partitions
                    .into_iter()
                    .map(|name| (name.into(), Vec::new()))
                    .collect(),
            ),
            faults: RwLock::default(),
        }
    }

    /// Replace the contents of a partition directly, creating it if needed.
    pub async fn seed(&self, partition: &str, records: Vec<Value>) {
        self.partitions
            .write()
            .await
            .insert(partition.to_string(), records);
    }

    /// Current contents of a partition.
    pub async fn records(&self, partition: &str) -> Option<Vec<Value>> {
        self.partitions.read().await.get(partition).cloned()
    }

    /// Make `fault` operations on `partition` fail until cleared.
    pub async fn inject_fault(&self, partition: &str, fault: Fault) {
        self.faults
            .write()
            .await
            .insert((partition.to_string(), fault));
    }

    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    async fn check(&self, partition: &str, fault: Fault) -> Result<(), StoreError> {
        if self
            .faults
            .read()
            .await
            .contains(&(partition.to_string(), fault))
        {
            return Err(StoreError::Unavailable(format!(
                "injected {fault:?} fault on `{partition}`"
            )));
        }
        Ok(())
    }
}

fn has_id(record: &Value, id: &str) -> bool {
    record
        .get("id")
        .and_then(id_text)
        .is_some_and(|text| text == id)
}

#[async_trait]
impl PartitionStore for MemoryPartitionStore {
    async fn select_all(&self, partition: &str) -> Result<Vec<Value>, StoreError> {
        self.check(partition, Fault::Reads).await?;
        self.records(partition)
            .await
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))
    }

    async fn delete_all(&self, partition: &str) -> Result<(), StoreError> {
        self.check(partition, Fault::Writes).await?;
        let mut partitions = self.partitions.write().await;
        let records = partitions
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        records.clear();
        Ok(())
    }

    async fn insert_many(&self, partition: &str, records: &[Value]) -> Result<(), StoreError> {
        self.check(partition, Fault::Writes).await?;
        let mut partitions = self.partitions.write().await;
        let existing = partitions
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        existing.extend(records.iter().cloned());
        Ok(())
    }

    async fn upsert(
        &self,
        partition: &str,
        record: &Value,
        conflict_key: &str,
    ) -> Result<(), StoreError> {
        self.check(partition, Fault::Writes).await?;
        let fields = record
            .as_object()
            .ok_or_else(|| StoreError::InvalidRecord("record must be an object".into()))?;
        let key = fields.get(conflict_key).ok_or_else(|| {
            StoreError::InvalidRecord(format!("record has no `{conflict_key}` field"))
        })?;

        let mut partitions = self.partitions.write().await;
        let existing = partitions
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        match existing
            .iter_mut()
            .find(|r| r.get(conflict_key) == Some(key))
        {
            Some(Value::Object(current)) => {
                for (field, value) in fields {
                    current.insert(field.clone(), value.clone());
                }
            }
            Some(other) => *other = record.clone(),
            None => existing.push(record.clone()),
        }
        Ok(())
    }

    async fn insert_one(&self, partition: &str, record: &Value) -> Result<Value, StoreError> {
        self.check(partition, Fault::Writes).await?;
        let mut fields = record
            .as_object()
            .cloned()
            .ok_or_else(|| StoreError::InvalidRecord("record must be an object".into()))?;
        // Column defaults of the managed tables.
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        let stored = Value::Object(fields);

        let mut partitions = self.partitions.write().await;
        let existing = partitions
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        existing.push(stored.clone());
        Ok(stored)
    }

    async fn update_by_id(
        &self,
        partition: &str,
        id: &str,
        fields: &Value,
    ) -> Result<Option<Value>, StoreError> {
        self.check(partition, Fault::Writes).await?;
        let fields = fields
            .as_object()
            .ok_or_else(|| StoreError::InvalidRecord("fields must be an object".into()))?;

        let mut partitions = self.partitions.write().await;
        let existing = partitions
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        let Some(Value::Object(current)) = existing.iter_mut().find(|r| has_id(r, id)) else {
            return Ok(None);
        };
        for (field, value) in fields {
            current.insert(field.clone(), value.clone());
        }
        Ok(Some(Value::Object(current.clone())))
    }

    async fn delete_by_id(&self, partition: &str, id: &str) -> Result<bool, StoreError> {
        self.check(partition, Fault::Writes).await?;
        let mut partitions = self.partitions.write().await;
        let existing = partitions
            .get_mut(partition)
            .ok_or_else(|| StoreError::UnknownPartition(partition.to_string()))?;
        let before = existing.len();
        existing.retain(|r| !has_id(r, id));
        Ok(existing.len() < before)
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object with an explicit creation time, overwriting any
    /// previous object of that name.
    pub async fn put_at(&self, bucket: &str, name: &str, bytes: Vec<u8>, created_at: DateTime<Utc>) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(name.to_string(), StoredObject { bytes, created_at });
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets.entry(bucket.to_string()).or_default();
        if objects.contains_key(name) {
            return Err(StoreError::Collision(name.to_string()));
        }
        objects.insert(
            name.to_string(),
            StoredObject {
                bytes,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let buckets = self.buckets.read().await;
        Ok(buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .iter()
                    .map(|(name, object)| ObjectInfo {
                        name: name.clone(),
                        size: object.bytes.len() as u64,
                        created_at: object.created_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(name))
            .map(|object| object.bytes.clone())
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))
    }

    async fn delete(&self, bucket: &str, names: &[String]) -> Result<Vec<String>, StoreError> {
        let mut buckets = self.buckets.write().await;
        let Some(objects) = buckets.get_mut(bucket) else {
            return Ok(Vec::new());
        };
        Ok(names
            .iter()
            .filter(|name| objects.remove(name.as_str()).is_some())
            .cloned()
            .collect())
    }
}
