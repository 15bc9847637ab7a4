//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL. Without one the store runs file-only.
    pub database_url: Option<String>,
    /// Path of the JSON file backend
    pub data_file: PathBuf,
    /// Pin the store to the file backend for the whole process lifetime
    pub force_file_store: bool,
    /// Bound on every remote call, including pool acquisition
    pub remote_timeout: Duration,
    /// Reconnect backoff after ordinary network failures
    pub reconnect_base: Duration,
    /// Reconnect backoff after name-resolution failures
    pub reconnect_dns: Duration,
    /// Upper bound for any reconnect backoff
    pub reconnect_max: Duration,
    /// Maximum writers allowed to queue on the file backend
    pub write_queue_limit: usize,
    /// Shared secret for bearer tokens and WebSocket auth
    pub auth_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let data_file = lookup("DATA_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data/roster.json"));
        let force_file_store = parse_bool(&lookup, "FORCE_FILE_STORE", false)?;

        let remote_timeout = Duration::from_millis(parse_or(&lookup, "REMOTE_TIMEOUT_MS", 5_000)?);
        let reconnect_base = Duration::from_millis(parse_or(&lookup, "RECONNECT_BASE_MS", 5_000)?);
        let reconnect_dns = Duration::from_millis(parse_or(&lookup, "RECONNECT_DNS_MS", 60_000)?);
        let reconnect_max = Duration::from_millis(parse_or(&lookup, "RECONNECT_MAX_MS", 300_000)?);

        let write_queue_limit = parse_or(&lookup, "WRITE_QUEUE_LIMIT", 1024usize)?;
        if write_queue_limit == 0 {
            return Err(ConfigError::Invalid("WRITE_QUEUE_LIMIT"));
        }

        let auth_secret = lookup("AUTH_SECRET").filter(|s| !s.is_empty());

        Ok(Self {
            host,
            port,
            database_url,
            data_file,
            force_file_store,
            remote_timeout,
            reconnect_base,
            reconnect_dns,
            reconnect_max,
            write_queue_limit,
            auth_secret,
        })
    }

    /// Whether the remote backend should be used at all.
    pub fn remote_enabled(&self) -> bool {
        self.database_url.is_some() && !self.force_file_store
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::Invalid(key)),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    Invalid(&'static str),
}
