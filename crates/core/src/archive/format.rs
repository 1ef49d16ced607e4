//! Archive document layout.
//!
//! ```json
//! {
//!   "formatVersion": 1,
//!   "createdAt": "2024-05-01T12:30:45.123Z",
//!   "partitions": ["pages", "social_links"],
//!   "data": { "pages": [...], "social_links": [...] }
//! }
//! ```
//!
//! Archives written before the header existed are a bare `data` object and
//! are still accepted on read.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const FORMAT_VERSION: u64 = 1;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("archive is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("archive must be a JSON object")]
    NotAnObject,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(Value),
    #[error("archive header is missing `{0}`")]
    MissingField(&'static str),
    #[error("header lists partitions {listed:?} but data holds {found:?}")]
    PartitionMismatch { listed: Vec<String>, found: Vec<String> },
    #[error("partition `{0}` must hold an array of records")]
    PartitionNotArray(String),
    #[error("partition `{0}` is not restorable here")]
    UnknownPartition(String),
}

/// Records of one partition at backup time.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSnapshot {
    pub name: String,
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    /// Absent for headerless archives.
    pub created_at: Option<DateTime<Utc>>,
    pub partitions: Vec<PartitionSnapshot>,
}

impl Archive {
    pub fn new(created_at: DateTime<Utc>, partitions: Vec<PartitionSnapshot>) -> Self {
        Self {
            created_at: Some(created_at),
            partitions,
        }
    }

    /// Partition names in archive order.
    pub fn partition_names(&self) -> Vec<String> {
        self.partitions.iter().map(|p| p.name.clone()).collect()
    }

    /// The `{partition: [records]}` mapping.
    pub fn data(&self) -> Value {
        Value::Object(
            self.partitions
                .iter()
                .map(|p| (p.name.clone(), Value::Array(p.records.clone())))
                .collect(),
        )
    }

    pub fn to_json(&self) -> Value {
        let mut header = json!({
            "formatVersion": FORMAT_VERSION,
            "partitions": self.partition_names(),
            "data": self.data(),
        });
        if let Some(created_at) = self.created_at {
            header["createdAt"] = json!(created_at);
        }
        header
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.to_json())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, FormatError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_json(value)
    }

    pub fn from_json(value: Value) -> Result<Self, FormatError> {
        let Value::Object(mut root) = value else {
            return Err(FormatError::NotAnObject);
        };
        if !root.contains_key("formatVersion") {
            return Ok(Self {
                created_at: None,
                partitions: snapshots(root)?,
            });
        }

        let version = root.remove("formatVersion").unwrap_or(Value::Null);
        if version.as_u64() != Some(FORMAT_VERSION) {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let created_at = match root.remove("createdAt") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(
                serde_json::from_value::<DateTime<Utc>>(raw)
                    .map_err(|_| FormatError::MissingField("createdAt"))?,
            ),
        };
        let listed: Vec<String> = match root.remove("partitions") {
            Some(raw) => {
                serde_json::from_value(raw).map_err(|_| FormatError::MissingField("partitions"))?
            }
            None => return Err(FormatError::MissingField("partitions")),
        };
        let Some(Value::Object(data)) = root.remove("data") else {
            return Err(FormatError::MissingField("data"));
        };

        let found: Vec<String> = data.keys().cloned().collect();
        let listed_set: HashSet<&String> = listed.iter().collect();
        let found_set: HashSet<&String> = found.iter().collect();
        if listed_set != found_set || listed.len() != found.len() {
            return Err(FormatError::PartitionMismatch { listed, found });
        }

        let mut by_name: Map<String, Value> = data;
        let ordered = listed
            .into_iter()
            .filter_map(|name| by_name.remove(&name).map(|records| (name, records)))
            .collect();
        Ok(Self {
            created_at,
            partitions: snapshots(ordered)?,
        })
    }

    /// Reject partitions outside `allowed`.
    pub fn ensure_partitions_within(&self, allowed: &[String]) -> Result<(), FormatError> {
        match self
            .partitions
            .iter()
            .find(|p| !allowed.contains(&p.name))
        {
            Some(p) => Err(FormatError::UnknownPartition(p.name.clone())),
            None => Ok(()),
        }
    }
}

fn snapshots(data: Map<String, Value>) -> Result<Vec<PartitionSnapshot>, FormatError> {
    data.into_iter()
        .map(|(name, records)| match records {
            Value::Array(records) => Ok(PartitionSnapshot { name, records }),
            _ => Err(FormatError::PartitionNotArray(name)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Archive {
        Archive::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            vec![
                PartitionSnapshot {
                    name: "pages".into(),
                    records: vec![json!({"id": 1, "title": "Home"})],
                },
                PartitionSnapshot {
                    name: "social_links".into(),
                    records: vec![],
                },
            ],
        )
    }

    #[test]
    fn data_section_is_the_plain_mapping() {
        let parsed: Value = serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        assert_eq!(
            parsed["data"],
            json!({"pages": [{"id": 1, "title": "Home"}], "social_links": []})
        );
        assert_eq!(parsed["formatVersion"], json!(1));
        assert_eq!(parsed["partitions"], json!(["pages", "social_links"]));
    }

    #[test]
    fn header_form_is_read_back() {
        let archive = sample();
        assert_eq!(Archive::from_slice(&archive.to_bytes().unwrap()).unwrap(), archive);
    }

    #[test]
    fn legacy_headerless_archive_is_accepted() {
        let archive =
            Archive::from_slice(br#"{"pages": [{"id": 1}], "social_links": []}"#).unwrap();
        assert_eq!(archive.created_at, None);
        assert_eq!(archive.partition_names(), vec!["pages", "social_links"]);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Archive::from_slice(b"not json"),
            Err(FormatError::NotJson(_))
        ));
        assert!(matches!(
            Archive::from_slice(b"[1, 2]"),
            Err(FormatError::NotAnObject)
        ));
        assert!(matches!(
            Archive::from_slice(br#"{"pages": {"id": 1}}"#),
            Err(FormatError::PartitionNotArray(p)) if p == "pages"
        ));
    }

    #[test]
    fn header_must_match_data() {
        let bad = json!({
            "formatVersion": 1,
            "partitions": ["pages", "projects"],
            "data": {"pages": []}
        });
        assert!(matches!(
            Archive::from_json(bad),
            Err(FormatError::PartitionMismatch { .. })
        ));
    }

    #[test]
    fn future_versions_are_refused() {
        let bad = json!({"formatVersion": 2, "partitions": [], "data": {}});
        assert!(matches!(
            Archive::from_json(bad),
            Err(FormatError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn partitions_outside_allow_list_are_flagged() {
        let allowed = vec!["pages".to_string()];
        assert!(matches!(
            sample().ensure_partitions_within(&allowed),
            Err(FormatError::UnknownPartition(p)) if p == "social_links"
        ));
    }
}
