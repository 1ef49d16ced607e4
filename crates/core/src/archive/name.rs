//! Backup object naming.
//!
//! Names embed the UTC creation time with `:` and `.` replaced by `-`:
//! `backup-2024-05-01T12-30-45-123Z.json`. The timestamp is fixed-width, so
//! sorting names lexicographically sorts them chronologically.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

const BACKUP_PREFIX: &str = "backup-";
const BACKUP_SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// Build the object name for a backup taken at `at`.
pub fn backup_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{BACKUP_PREFIX}{stamp}{BACKUP_SUFFIX}")
}

/// Recover the creation time from a backup name, if it follows the scheme.
pub fn parse_backup_name(name: &str) -> Option<DateTime<Utc>> {
    let stamp = name
        .strip_prefix(BACKUP_PREFIX)?
        .strip_suffix(BACKUP_SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
