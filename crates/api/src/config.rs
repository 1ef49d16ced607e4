use std::env;
use std::time::Duration;

use site_admin_core::config::{parse_or, ConfigError, StoreConfig};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// Database, partitions and backup bucket.
    pub store: StoreConfig,
    /// JWT signing secret for admin tokens.
    pub jwt_secret: String,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
    /// How long a restore confirmation stays valid.
    pub confirmation_ttl: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|name: &str| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(lookup, "PORT", 3030)?,
            store: StoreConfig::from_lookup(lookup)?,
            jwt_secret: lookup("JWT_SECRET")
                .unwrap_or_else(|| "dev-secret-change-me-in-production".to_string()),
            event_bus_capacity: parse_or(lookup, "EVENT_BUS_CAPACITY", 1024)?,
            confirmation_ttl: Duration::from_secs(parse_or(lookup, "CONFIRMATION_TTL_SECS", 300)?),
            max_body_bytes: parse_or(lookup, "MAX_BODY_BYTES", 2 * 1024 * 1024)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
