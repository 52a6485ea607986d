//! Configuration module for the projects backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;

const DEFAULT_DB_PATH: &str = "./data/projects.sqlite";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MAX_TITLE_LENGTH: usize = 120;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Maximum pooled database connections
    pub db_max_connections: u32,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
    /// Recipient of project submission notifications
    pub admin_email: String,
    /// Upper bound on project title length, in characters
    pub max_title_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.into(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            max_title_length: DEFAULT_MAX_TITLE_LENGTH,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let db_path = env::var("PROJECTS_DB_PATH")
            .unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
            .into();

        let db_max_connections =
            parse_or_default("PROJECTS_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);

        let log_level =
            env::var("PROJECTS_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

        let log_json = parse_or_default("PROJECTS_LOG_JSON", false);

        let admin_email =
            env::var("PROJECTS_ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());

        let max_title_length =
            parse_or_default("PROJECTS_MAX_TITLE_LENGTH", DEFAULT_MAX_TITLE_LENGTH);

        Self {
            db_path,
            db_max_connections,
            log_level,
            log_json,
            admin_email,
            max_title_length,
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset or malformed.
fn parse_or_default<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using {}", raw, key, default);
            default
        }),
        Err(_) => default,
    }
}
