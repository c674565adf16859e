//! Configuration management

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::Level;

use crate::remote::{SshSettings, DEFAULT_REPL_LOG_PATH};
use crate::store::PostgresSettings;

/// Where confirmed records are written
#[derive(Clone)]
pub enum StoreBackend {
    Postgres(PostgresSettings),
    /// Embedded SQLite file, for local runs
    Sqlite(PathBuf),
}

/// Bot configuration
#[derive(Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_token: String,

    /// Monitored host
    pub ssh: SshSettings,

    /// Record store
    pub store: StoreBackend,

    /// PostgreSQL log read by `/get_repl_logs`
    pub repl_log_path: String,

    /// Log to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).with_context(|| format!("{} must be set", key));
        let port = |key: &str, default: u16| -> Result<u16> {
            match get(key) {
                Some(v) => v
                    .trim()
                    .parse()
                    .with_context(|| format!("{} is not a valid port: {:?}", key, v)),
                None => Ok(default),
            }
        };

        let telegram_token = required("TOKEN")?;

        let ssh = SshSettings {
            host: required("RM_HOST")?,
            port: port("RM_PORT", 22)?,
            user: required("RM_USER")?,
            password: required("RM_PASSWORD")?,
        };

        let backend = get("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres(PostgresSettings {
                host: required("DB_HOST")?,
                port: port("DB_PORT", 5432)?,
                user: required("DB_USER")?,
                password: required("DB_PASSWORD")?,
                database: required("DB_DATABASE")?,
            }),
            "sqlite" => StoreBackend::Sqlite(
                get("SQLITE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./sysops.db")),
            ),
            other => anyhow::bail!("Unknown STORE_BACKEND: {}", other),
        };

        let repl_log_path =
            get("REPL_LOG_PATH").unwrap_or_else(|| DEFAULT_REPL_LOG_PATH.to_string());

        let log_file = get("LOG_FILE").filter(|v| !v.is_empty()).map(PathBuf::from);

        Ok(Self {
            telegram_token,
            ssh,
            store,
            repl_log_path,
            log_file,
        })
    }
}

/// Map a `RUST_LOG` value to a max level; unset or unknown means info.
pub fn log_level(value: Option<&str>) -> Level {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("trace") => Level::TRACE,
        Some("debug") => Level::DEBUG,
        Some("warn") => Level::WARN,
        Some("error") => Level::ERROR,
        _ => Level::INFO,
    }
}
