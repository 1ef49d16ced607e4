//! Validation of partition names, column names and records.

use serde_json::Value;
use thiserror::Error;

/// Postgres truncates identifiers beyond this length.
const MAX_IDENTIFIER_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("identifier cannot be empty")]
    EmptyIdentifier,
    #[error("identifier `{0}` is longer than 63 bytes")]
    IdentifierTooLong(String),
    #[error("identifier `{0}` may only contain ASCII letters, digits and underscores")]
    InvalidIdentifier(String),
    #[error("record must be a JSON object")]
    RecordNotObject,
}

/// Check that `name` is usable as a table or column name.
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(ValidationError::EmptyIdentifier),
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        Some(_) => return Err(ValidationError::InvalidIdentifier(name.to_string())),
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::IdentifierTooLong(name.to_string()));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Check that a record is a JSON object and return its fields.
pub fn validate_record(record: &Value) -> Result<&serde_json::Map<String, Value>, ValidationError> {
    record.as_object().ok_or(ValidationError::RecordNotObject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_table_names() {
        assert!(validate_identifier("social_links").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("pages2").is_ok());
    }

    #[test]
    fn rejects_injection_attempts() {
        assert_eq!(
            validate_identifier("pages; DROP TABLE pages"),
            Err(ValidationError::InvalidIdentifier("pages; DROP TABLE pages".into()))
        );
        assert!(validate_identifier("\"pages\"").is_err());
        assert!(validate_identifier("9lives").is_err());
        assert_eq!(validate_identifier(""), Err(ValidationError::EmptyIdentifier));
        assert!(matches!(
            validate_identifier(&"a".repeat(64)),
            Err(ValidationError::IdentifierTooLong(_))
        ));
    }

    #[test]
    fn records_must_be_objects() {
        assert!(validate_record(&json!({"id": 1})).is_ok());
        assert_eq!(validate_record(&json!([1])), Err(ValidationError::RecordNotObject));
    }
}
