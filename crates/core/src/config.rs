use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::archive::ArchiveSettings;
use crate::document::model::DEFAULT_PARTITIONS;
use crate::document::validate::validate_identifier;
use crate::media::ImageSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Read `name` through `lookup` and parse it, using `default` when unset.
pub fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Parse a comma-separated partition list, dropping blanks and duplicates.
pub fn parse_partitions(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut partitions: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        validate_identifier(name).map_err(|e| ConfigError::Invalid {
            name: "BACKUP_PARTITIONS",
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !partitions.iter().any(|p| p == name) {
            partitions.push(name.to_string());
        }
    }
    if partitions.is_empty() {
        return Err(ConfigError::Invalid {
            name: "BACKUP_PARTITIONS",
            value: raw.to_string(),
            reason: "at least one partition is required".into(),
        });
    }
    Ok(partitions)
}

/// Connection and backup settings shared by the API and the CLI.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// Partitions included in a full backup, in restore order.
    pub partitions: Vec<String>,
    /// Bucket that receives backup objects.
    pub bucket: String,
    /// Deadline for every remote call.
    pub remote_timeout: Duration,
    /// Bucket holding uploaded images.
    pub image_bucket: String,
    /// Folder of `image_bucket` the image library works in.
    pub image_folder: String,
    /// Base URL images are served from.
    pub image_public_base_url: Option<String>,
}

impl StoreConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name: &str| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let partitions = match lookup("BACKUP_PARTITIONS") {
            Some(raw) => parse_partitions(&raw)?,
            None => DEFAULT_PARTITIONS.iter().map(|p| p.to_string()).collect(),
        };
        let image_folder = lookup("IMAGE_FOLDER")
            .map(|folder| folder.trim_matches('/').to_string())
            .unwrap_or_else(|| "public".to_string());
        if image_folder.is_empty() || image_folder.contains('/') {
            return Err(ConfigError::Invalid {
                name: "IMAGE_FOLDER",
                value: image_folder,
                reason: "must be a single folder name".into(),
            });
        }
        Ok(Self {
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            db_max_connections: parse_or(lookup, "DB_MAX_CONNECTIONS", 20)?,
            db_min_connections: parse_or(lookup, "DB_MIN_CONNECTIONS", 1)?,
            partitions,
            bucket: lookup("BACKUP_BUCKET").unwrap_or_else(|| "backups".to_string()),
            remote_timeout: Duration::from_secs(parse_or(lookup, "REMOTE_TIMEOUT_SECS", 30)?),
            image_bucket: lookup("IMAGE_BUCKET").unwrap_or_else(|| "img".to_string()),
            image_folder,
            image_public_base_url: lookup("IMAGE_PUBLIC_BASE_URL").filter(|url| !url.trim().is_empty()),
        })
    }

    pub fn archive_settings(&self) -> ArchiveSettings {
        ArchiveSettings {
            partitions: self.partitions.clone(),
            bucket: self.bucket.clone(),
            timeout: self.remote_timeout,
        }
    }

    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            bucket: self.image_bucket.clone(),
            folder: self.image_folder.clone(),
            public_base_url: self.image_public_base_url.clone(),
            timeout: self.remote_timeout,
        }
    }

    /// Open the connection pool.
    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(self.db_max_connections)
            .min_connections(self.db_min_connections)
            .acquire_timeout(self.remote_timeout)
            .connect(&self.database_url)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = StoreConfig::from_lookup(&lookup(&[("DATABASE_URL", "postgres://db")])).unwrap();
        assert_eq!(config.bucket, "backups");
        assert_eq!(config.remote_timeout, Duration::from_secs(30));
        assert_eq!(config.partitions.len(), DEFAULT_PARTITIONS.len());
        assert_eq!(config.partitions[0], "site_content");
    }

    #[test]
    fn database_url_is_required() {
        assert!(matches!(
            StoreConfig::from_lookup(&lookup(&[])),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let err = StoreConfig::from_lookup(&lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("REMOTE_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "REMOTE_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn image_settings_defaults_and_folder_check() {
        let config = StoreConfig::from_lookup(&lookup(&[("DATABASE_URL", "postgres://db")])).unwrap();
        let images = config.image_settings();
        assert_eq!(images.bucket, "img");
        assert_eq!(images.folder, "public");
        assert_eq!(images.public_base_url, None);

        let config = StoreConfig::from_lookup(&lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("IMAGE_FOLDER", "/uploads/"),
            ("IMAGE_PUBLIC_BASE_URL", "https://cdn.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.image_folder, "uploads");
        assert_eq!(config.image_public_base_url.as_deref(), Some("https://cdn.example.com"));

        let err = StoreConfig::from_lookup(&lookup(&[
            ("DATABASE_URL", "postgres://db"),
            ("IMAGE_FOLDER", "a/b"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "IMAGE_FOLDER", .. }));
    }

    #[test]
    fn partition_list_is_cleaned() {
        assert_eq!(
            parse_partitions(" pages, social_links,,pages ").unwrap(),
            vec!["pages", "social_links"]
        );
        assert!(parse_partitions(" , ").is_err());
        assert!(parse_partitions("pages, drop table").is_err());
    }
}
