//! Configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::AdminError;

/// Which backend holds the event log and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    File,
    Postgres,
}

impl FromStr for StoreKind {
    type Err = AdminError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreKind::File),
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Err(AdminError::Config(
                "PLANETS_STORE=memory would start empty on every run; use file or postgres"
                    .to_string(),
            )),
            other => Err(AdminError::Config(format!(
                "PLANETS_STORE must be file or postgres, got `{other}`"
            ))),
        }
    }
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Admin configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `PLANETS_STORE`: `file` or `postgres` (default: `file`)
/// - `PLANETS_DATA_DIR`: root of the file backend (default: `data`)
/// - `DATABASE_URL`: required for the postgres backend
/// - `PLANETS_DB_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `RUST_LOG`: tracing filter directive (default: `info`)
/// - `LOG_FORMAT`: `json` switches to JSON log lines
#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, AdminError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AdminError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store = match lookup("PLANETS_STORE") {
            Some(value) => value.parse()?,
            None => defaults.store,
        };

        let db_max_connections = match lookup("PLANETS_DB_MAX_CONNECTIONS") {
            Some(value) => value.trim().parse().map_err(|_| {
                AdminError::Config(format!(
                    "PLANETS_DB_MAX_CONNECTIONS must be a positive integer, got `{value}`"
                ))
            })?,
            None => defaults.db_max_connections,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if store == StoreKind::Postgres && database_url.is_none() {
            return Err(AdminError::Config(
                "DATABASE_URL is required when PLANETS_STORE=postgres".to_string(),
            ));
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            store,
            data_dir: lookup("PLANETS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            database_url,
            db_max_connections,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::File,
            data_dir: PathBuf::from("data"),
            database_url: None,
            db_max_connections: 5,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
