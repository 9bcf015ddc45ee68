//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_GEMINI_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash-lite";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub upload_dir: PathBuf,
    pub cors_origin: String,
    pub max_upload_bytes: usize,

    // Generation
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub generation_model: String,
    pub generation_max_attempts: u32,
    pub generation_backoff: Duration,

    // Ingestion
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub ingest_concurrency: usize,
    pub ingest_queue_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let upload_dir = lookup("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads/documents"));
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", Ok(10 * 1024 * 1024))?;

        // --- Generation Settings ---
        let gemini_api_key = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty());
        let gemini_api_base =
            lookup("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_GEMINI_API_BASE.to_string());
        let generation_model =
            lookup("GENERATION_MODEL").unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string());
        let generation_max_attempts: u32 = parse_or(&lookup, "GENERATION_MAX_ATTEMPTS", Ok(3))?;
        if generation_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "GENERATION_MAX_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let generation_backoff =
            Duration::from_millis(parse_or(&lookup, "GENERATION_BACKOFF_MS", Ok(500))?);

        // --- Ingestion Settings ---
        let chunk_size = parse_or(&lookup, "CHUNK_SIZE", Ok(500))?;
        let chunk_overlap = parse_or(&lookup, "CHUNK_OVERLAP", Ok(50))?;
        let ingest_concurrency = parse_or(&lookup, "INGEST_CONCURRENCY", Ok(4))?;
        let ingest_queue_capacity = parse_or(&lookup, "INGEST_QUEUE_CAPACITY", Ok(64))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            upload_dir,
            cors_origin,
            max_upload_bytes,
            gemini_api_key,
            gemini_api_base,
            generation_model,
            generation_max_attempts,
            generation_backoff,
            chunk_size,
            chunk_overlap,
            ingest_concurrency,
            ingest_queue_capacity,
        })
    }
}

/// Parses `key` when it is set, otherwise falls back to `default`.
fn parse_or<F, T>(
    lookup: &F,
    key: &str,
    default: Result<T, T::Err>,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = match lookup(key) {
        Some(raw) => raw.trim().parse::<T>(),
        None => default,
    };
    parsed.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
