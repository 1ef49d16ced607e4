//! Postgres adapter: partitions are tables, blobs live in `storage_objects`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use super::{BlobStore, ObjectInfo, PartitionStore, StoreError};
use crate::document::validate::{validate_identifier, validate_record};

/// Tables exposed as partitions. Only names in the allow-list are ever
/// interpolated into SQL.
#[derive(Debug, Clone)]
pub struct PgPartitionStore {
    pool: PgPool,
    allowed: HashSet<String>,
}

impl PgPartitionStore {
    pub fn new<I, S>(pool: PgPool, partitions: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed = HashSet::new();
        for name in partitions {
            let name = name.into();
            validate_identifier(&name)
                .map_err(|e| StoreError::UnknownPartition(format!("{name}: {e}")))?;
            allowed.insert(name);
        }
        Ok(Self { pool, allowed })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table<'a>(&self, partition: &'a str) -> Result<&'a str, StoreError> {
        if self.allowed.contains(partition) {
            Ok(partition)
        } else {
            Err(StoreError::UnknownPartition(partition.to_string()))
        }
    }
}

/// Column list of `record`, each name validated and quoted.
fn quoted_columns(record: &Value) -> Result<Vec<String>, StoreError> {
    let fields = validate_record(record).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
    fields
        .keys()
        .map(|column| {
            validate_identifier(column)
                .map(|_| format!("\"{column}\""))
                .map_err(|e| StoreError::InvalidRecord(e.to_string()))
        })
        .collect()
}

async fn delete_rows<'e, E>(executor: E, table: &str) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(&format!("DELETE FROM \"{table}\""))
        .execute(executor)
        .await?;
    Ok(())
}

async fn insert_rows<'e, E>(executor: E, table: &str, records: &[Value]) -> Result<(), StoreError>
where
    E: sqlx::PgExecutor<'e>,
{
    if records.is_empty() {
        return Ok(());
    }
    for record in records {
        validate_record(record).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
    }
    // Rows carry their original ids and timestamps, so identity columns are overridden.
    let sql = format!(
        "INSERT INTO \"{table}\" OVERRIDING SYSTEM VALUE \
         SELECT * FROM jsonb_populate_recordset(NULL::\"{table}\", $1)"
    );
    sqlx::query(&sql).bind(Json(records)).execute(executor).await?;
    Ok(())
}

#[async_trait]
impl PartitionStore for PgPartitionStore {
    async fn select_all(&self, partition: &str) -> Result<Vec<Value>, StoreError> {
        let table = self.table(partition)?;
        let rows: Vec<Value> =
            sqlx::query_scalar(&format!("SELECT to_jsonb(t) FROM \"{table}\" t"))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn delete_all(&self, partition: &str) -> Result<(), StoreError> {
        let table = self.table(partition)?;
        delete_rows(&self.pool, table).await
    }

    async fn insert_many(&self, partition: &str, records: &[Value]) -> Result<(), StoreError> {
        let table = self.table(partition)?;
        insert_rows(&self.pool, table, records).await
    }

    async fn upsert(
        &self,
        partition: &str,
        record: &Value,
        conflict_key: &str,
    ) -> Result<(), StoreError> {
        let table = self.table(partition)?;
        validate_identifier(conflict_key).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
        let columns = quoted_columns(record)?;
        let key = format!("\"{conflict_key}\"");
        if !columns.contains(&key) {
            return Err(StoreError::InvalidRecord(format!(
                "record has no `{conflict_key}` field"
            )));
        }

        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != key)
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        let on_conflict = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };
        let column_list = columns.join(", ");
        let sql = format!(
            "INSERT INTO \"{table}\" ({column_list}) \
             SELECT {column_list} FROM jsonb_populate_record(NULL::\"{table}\", $1) \
             ON CONFLICT ({key}) {on_conflict}"
        );
        sqlx::query(&sql).bind(Json(record)).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_one(&self, partition: &str, record: &Value) -> Result<Value, StoreError> {
        let table = self.table(partition)?;
        let columns = quoted_columns(record)?;
        let sql = if columns.is_empty() {
            format!("INSERT INTO \"{table}\" AS t DEFAULT VALUES RETURNING to_jsonb(t)")
        } else {
            let column_list = columns.join(", ");
            format!(
                "INSERT INTO \"{table}\" AS t ({column_list}) \
                 SELECT {column_list} FROM jsonb_populate_record(NULL::\"{table}\", $1) \
                 RETURNING to_jsonb(t)"
            )
        };
        let mut query = sqlx::query_scalar(&sql);
        if !columns.is_empty() {
            query = query.bind(Json(record));
        }
        let stored: Value = query.fetch_one(&self.pool).await?;
        Ok(stored)
    }

    async fn update_by_id(
        &self,
        partition: &str,
        id: &str,
        fields: &Value,
    ) -> Result<Option<Value>, StoreError> {
        let table = self.table(partition)?;
        let columns = quoted_columns(fields)?;
        if columns.is_empty() {
            let row: Option<Value> = sqlx::query_scalar(&format!(
                "SELECT to_jsonb(t) FROM \"{table}\" t WHERE t.\"id\"::text = $1"
            ))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
            return Ok(row);
        }
        let assignments: Vec<String> = columns.iter().map(|c| format!("{c} = r.{c}")).collect();
        let sql = format!(
            "UPDATE \"{table}\" AS t SET {} \
             FROM jsonb_populate_record(NULL::\"{table}\", $1) AS r \
             WHERE t.\"id\"::text = $2 RETURNING to_jsonb(t)",
            assignments.join(", ")
        );
        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(Json(fields))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_by_id(&self, partition: &str, id: &str) -> Result<bool, StoreError> {
        let table = self.table(partition)?;
        let result = sqlx::query(&format!("DELETE FROM \"{table}\" WHERE \"id\"::text = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_all(&self, partition: &str, records: &[Value]) -> Result<(), StoreError> {
        let table = self.table(partition)?;
        let mut tx = self.pool.begin().await?;
        delete_rows(&mut *tx, table).await?;
        insert_rows(&mut *tx, table, records).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Object storage in the `storage_objects` table, keyed by `(bucket, name)`.
#[derive(Debug, Clone)]
pub struct PgBlobStore {
    pool: PgPool,
}

impl PgBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlobStore for PgBlobStore {
    async fn upload(&self, bucket: &str, name: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let size = bytes.len() as i64;
        let result = sqlx::query(
            "INSERT INTO storage_objects (bucket, name, content, size) VALUES ($1, $2, $3, $4)",
        )
        .bind(bucket)
        .bind(name)
        .bind(bytes)
        .bind(size)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Collision(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, bucket: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        let rows: Vec<(String, i64, DateTime<Utc>)> = sqlx::query_as(
            "SELECT name, size, created_at FROM storage_objects \
             WHERE bucket = $1 ORDER BY created_at DESC, name DESC",
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, size, created_at)| ObjectInfo {
                name,
                size: size.max(0) as u64,
                created_at,
            })
            .collect())
    }

    async fn download(&self, bucket: &str, name: &str) -> Result<Vec<u8>, StoreError> {
        let content: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT content FROM storage_objects WHERE bucket = $1 AND name = $2",
        )
        .bind(bucket)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        content.ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))
    }

    async fn delete(&self, bucket: &str, names: &[String]) -> Result<Vec<String>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let removed: Vec<String> = sqlx::query_scalar(
            "DELETE FROM storage_objects WHERE bucket = $1 AND name = ANY($2) RETURNING name",
        )
        .bind(bucket)
        .bind(names)
        .fetch_all(&self.pool)
        .await?;
        Ok(removed)
    }
}
