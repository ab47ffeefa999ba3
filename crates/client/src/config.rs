//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `MEDIPLUS_API_URL` - Backend base URL (default: `http://127.0.0.1:8000`)
//! - `MEDIPLUS_SESSION_FILE` - Persisted session path
//!   (default: `$HOME/.mediplus/session.json`)
//! - `MEDIPLUS_POLL_INTERVAL_SECS` - Pharmacist queue refresh (default: 5)
//! - `MEDIPLUS_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `MEDIPLUS_LOG_FORMAT` - `text` or `json` (default: text)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const SESSION_DIR: &str = ".mediplus";
const SESSION_FILE: &str = "session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format for the CLI subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Mediplus client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL
    pub api_url: Url,
    /// Where the session is persisted between runs
    pub session_file: PathBuf,
    /// Pharmacist queue refresh interval
    pub poll_interval: Duration,
    /// Per-request timeout
    pub http_timeout: Duration,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Load configuration from the process environment (and `.env`, if present).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value, or if
    /// neither `MEDIPLUS_SESSION_FILE` nor `HOME` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is fine.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get_or_default =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_url = parse_url(
            "MEDIPLUS_API_URL",
            &get_or_default("MEDIPLUS_API_URL", DEFAULT_API_URL),
        )?;

        let session_file = match lookup("MEDIPLUS_SESSION_FILE") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => lookup("HOME")
                .map(|home| PathBuf::from(home).join(SESSION_DIR).join(SESSION_FILE))
                .ok_or_else(|| ConfigError::MissingEnvVar("HOME".to_string()))?,
        };

        let poll_interval = parse_secs(
            "MEDIPLUS_POLL_INTERVAL_SECS",
            lookup("MEDIPLUS_POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL_SECS,
        )?;
        let http_timeout = parse_secs(
            "MEDIPLUS_HTTP_TIMEOUT_SECS",
            lookup("MEDIPLUS_HTTP_TIMEOUT_SECS"),
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;

        let log_format = match get_or_default("MEDIPLUS_LOG_FORMAT", "text")
            .to_ascii_lowercase()
            .as_str()
        {
            "text" | "" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "MEDIPLUS_LOG_FORMAT".to_string(),
                    format!("expected text or json, got {other}"),
                ));
            }
        };

        Ok(Self {
            api_url,
            session_file,
            poll_interval,
            http_timeout,
            log_format,
        })
    }

    /// Defaults pointed at `api_url`, with the session stored at `session_file`.
    #[must_use]
    pub fn new(api_url: Url, session_file: impl Into<PathBuf>) -> Self {
        Self {
            api_url,
            session_file: session_file.into(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            log_format: LogFormat::default(),
        }
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_secs(key: &str, value: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(value) = value else {
        return Ok(Duration::from_secs(default));
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        )),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}
