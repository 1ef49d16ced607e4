//! Record collections edited one record at a time: pages, projects,
//! services and social links.
//!
//! Each [`Collection`] carries the rules the admin forms enforce before a
//! record reaches the store, and the order the records are shown in.

use std::cmp::Ordering;

use serde_json::{Map, Value};
use thiserror::Error;

use super::model::{PAGES_PARTITION, PROJECTS_PARTITION, SERVICES_PARTITION, SOCIAL_LINKS_PARTITION};
use crate::store::{id_text, PartitionStore, StoreError};

/// Columns owned by the database.
const GENERATED_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("field `{field}` {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("another record already uses {field} `{value}`")]
    Duplicate { field: &'static str, value: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> RecordError {
    RecordError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending(&'static str),
    Descending(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    /// Non-empty text, required on create.
    Required(&'static str),
    /// Lowercase letters, digits and dashes, unique across the collection.
    Slug(&'static str),
    /// A list of strings. Comma-separated text is split; defaults to `[]`.
    TextList(&'static str),
    /// Visibility flag for the public site; defaults to `false`.
    PublishFlag(&'static str),
    /// Display position; defaults to the number of existing records.
    Position(&'static str),
}

/// A partition managed record by record.
#[derive(Debug, PartialEq, Eq)]
pub struct Collection {
    pub partition: &'static str,
    pub order: SortOrder,
    rules: &'static [Rule],
}

pub const PAGES: Collection = Collection {
    partition: PAGES_PARTITION,
    order: SortOrder::Descending("created_at"),
    rules: &[
        Rule::Required("title"),
        Rule::Required("slug"),
        Rule::Slug("slug"),
        Rule::PublishFlag("is_published"),
    ],
};

pub const PROJECTS: Collection = Collection {
    partition: PROJECTS_PARTITION,
    order: SortOrder::Ascending("sort_order"),
    rules: &[
        Rule::Required("title"),
        Rule::TextList("tags"),
        Rule::Position("sort_order"),
    ],
};

pub const SERVICES: Collection = Collection {
    partition: SERVICES_PARTITION,
    order: SortOrder::Ascending("sort_order"),
    rules: &[
        Rule::Required("title"),
        Rule::TextList("features"),
        Rule::Position("sort_order"),
    ],
};

pub const SOCIAL_LINKS: Collection = Collection {
    partition: SOCIAL_LINKS_PARTITION,
    order: SortOrder::Ascending("sort_order"),
    rules: &[
        Rule::Required("platform"),
        Rule::Required("url"),
        Rule::Position("sort_order"),
    ],
};

pub const COLLECTIONS: &[&Collection] = &[&PAGES, &PROJECTS, &SERVICES, &SOCIAL_LINKS];

/// Look up the collection stored in `partition`.
pub fn collection(partition: &str) -> Option<&'static Collection> {
    COLLECTIONS.iter().copied().find(|c| c.partition == partition)
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn text_list(field: &'static str, value: Value) -> Result<Value, RecordError> {
    match value {
        Value::String(text) => Ok(Value::Array(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        )),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(Value::Array(items)),
        Value::Null => Ok(Value::Array(Vec::new())),
        _ => Err(invalid(field, "must be a list of strings")),
    }
}

/// Order two field values: numbers numerically, text lexically, absent last.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.is_null().cmp(&y.is_null()),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Collection {
    /// Order `records` for display.
    pub fn sort(&self, records: &mut [Value]) {
        match self.order {
            SortOrder::Ascending(field) => {
                records.sort_by(|a, b| compare_field(a.get(field), b.get(field)))
            }
            SortOrder::Descending(field) => {
                records.sort_by(|a, b| compare_field(b.get(field), a.get(field)))
            }
        }
    }

    /// Check and normalise submitted fields. Generated columns are dropped.
    /// On create, missing required fields fail and defaults are filled in;
    /// on update only the submitted fields are checked.
    pub fn prepare(
        &self,
        fields: Value,
        existing: &[Value],
        creating: bool,
    ) -> Result<Map<String, Value>, RecordError> {
        let Value::Object(mut fields) = fields else {
            return Err(RecordError::NotAnObject);
        };
        for generated in GENERATED_FIELDS {
            if fields.remove(*generated).is_some() {
                tracing::debug!(partition = self.partition, field = *generated, "Ignoring generated column");
            }
        }

        for rule in self.rules {
            match *rule {
                Rule::Required(field) => match fields.get(field) {
                    Some(Value::String(s)) if !s.trim().is_empty() => {}
                    None if !creating => {}
                    None => return Err(invalid(field, "is required")),
                    Some(_) => return Err(invalid(field, "must be non-empty text")),
                },
                Rule::Slug(field) => {
                    if let Some(Value::String(slug)) = fields.get(field) {
                        if !is_slug(slug) {
                            return Err(invalid(
                                field,
                                "may only contain lowercase letters, digits and inner dashes",
                            ));
                        }
                    }
                }
                Rule::TextList(field) => match fields.remove(field) {
                    Some(value) => {
                        fields.insert(field.into(), text_list(field, value)?);
                    }
                    None if creating => {
                        fields.insert(field.into(), Value::Array(Vec::new()));
                    }
                    None => {}
                },
                Rule::PublishFlag(field) => match fields.get(field) {
                    Some(Value::Bool(_)) => {}
                    Some(Value::Null) | None if creating => {
                        fields.insert(field.into(), Value::Bool(false));
                    }
                    None => {}
                    Some(_) => return Err(invalid(field, "must be true or false")),
                },
                Rule::Position(field) => match fields.get(field) {
                    Some(Value::Number(n)) if n.is_i64() => {}
                    Some(Value::Null) | None if creating => {
                        fields.insert(field.into(), Value::from(existing.len() as i64));
                    }
                    None => {}
                    Some(_) => return Err(invalid(field, "must be an integer")),
                },
            }
        }
        Ok(fields)
    }

    /// Fail if another record already holds one of this record's unique values.
    fn ensure_unique(
        &self,
        fields: &Map<String, Value>,
        existing: &[Value],
        own_id: Option<&str>,
    ) -> Result<(), RecordError> {
        for rule in self.rules {
            let Rule::Slug(field) = *rule else { continue };
            let Some(value) = fields.get(field) else { continue };
            let taken = existing.iter().any(|record| {
                record.get(field) == Some(value)
                    && record.get("id").and_then(id_text).as_deref() != own_id
            });
            if taken {
                return Err(RecordError::Duplicate {
                    field,
                    value: value.as_str().unwrap_or_default().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Every record, in display order.
    pub async fn list(&self, store: &dyn PartitionStore) -> Result<Vec<Value>, StoreError> {
        let mut records = store.select_all(self.partition).await?;
        self.sort(&mut records);
        Ok(records)
    }

    /// Records shown on the public site: published ones for collections with
    /// a publish flag, all of them otherwise.
    pub async fn list_visible(&self, store: &dyn PartitionStore) -> Result<Vec<Value>, StoreError> {
        let flag = self.rules.iter().find_map(|rule| match rule {
            Rule::PublishFlag(field) => Some(*field),
            _ => None,
        });
        let mut records = self.list(store).await?;
        if let Some(flag) = flag {
            records.retain(|record| record.get(flag) == Some(&Value::Bool(true)));
        }
        Ok(records)
    }

    pub async fn create(
        &self,
        store: &dyn PartitionStore,
        fields: Value,
    ) -> Result<Value, RecordError> {
        let existing = store.select_all(self.partition).await?;
        let fields = self.prepare(fields, &existing, true)?;
        self.ensure_unique(&fields, &existing, None)?;
        let stored = store
            .insert_one(self.partition, &Value::Object(fields))
            .await?;
        tracing::info!(partition = self.partition, id = ?stored.get("id"), "Record created");
        Ok(stored)
    }

    /// Update the submitted fields of record `id`; `None` if it does not exist.
    pub async fn update(
        &self,
        store: &dyn PartitionStore,
        id: &str,
        fields: Value,
    ) -> Result<Option<Value>, RecordError> {
        let existing = store.select_all(self.partition).await?;
        let fields = self.prepare(fields, &existing, false)?;
        self.ensure_unique(&fields, &existing, Some(id))?;
        let updated = store
            .update_by_id(self.partition, id, &Value::Object(fields))
            .await?;
        match &updated {
            Some(_) => tracing::info!(partition = self.partition, %id, "Record updated"),
            None => tracing::debug!(partition = self.partition, %id, "No record to update"),
        }
        Ok(updated)
    }

    pub async fn delete(&self, store: &dyn PartitionStore, id: &str) -> Result<bool, StoreError> {
        let deleted = store.delete_by_id(self.partition, id).await?;
        if deleted {
            tracing::info!(partition = self.partition, %id, "Record deleted");
        }
        Ok(deleted)
    }
}
