//! Client configuration.
//!
//! Built explicitly with `ClientConfig::new`, or from the environment
//! (and an optional `.env` file) with `ClientConfig::from_env`.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Backend used when `CRM_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

const SESSION_DIR: &str = "crm-client";
const SESSION_FILE: &str = "auth.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidDuration { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the CRM API, without trailing slash.
    pub base_url: String,
    /// JSON file holding the remembered session.
    pub session_file: PathBuf,
    /// Whole-request timeout. `None` leaves reqwest's default.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_file: default_session_file(),
            timeout: None,
            connect_timeout: None,
        }
    }

    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = path.into();
        self
    }

    /// Load from the process environment after applying `.env`, if present.
    ///
    /// Reads `CRM_API_URL`, `CRM_SESSION_FILE`, `CRM_HTTP_TIMEOUT_SECS` and
    /// `CRM_HTTP_CONNECT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("CRM_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let mut config = Self::new(base_url);
        if let Some(path) = lookup("CRM_SESSION_FILE").filter(|v| !v.trim().is_empty()) {
            config.session_file = PathBuf::from(path);
        }
        config.timeout = parse_secs("CRM_HTTP_TIMEOUT_SECS", lookup("CRM_HTTP_TIMEOUT_SECS"))?;
        config.connect_timeout = parse_secs(
            "CRM_HTTP_CONNECT_TIMEOUT_SECS",
            lookup("CRM_HTTP_CONNECT_TIMEOUT_SECS"),
        )?;

        log::debug!("CRM API at {}, session file {}", config.base_url, config.session_file.display());
        Ok(config)
    }
}

/// `<config dir>/crm-client/auth.json`, or `auth.json` in the working
/// directory when the platform has no config directory.
pub fn default_session_file() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(SESSION_DIR).join(SESSION_FILE),
        None => PathBuf::from(SESSION_FILE),
    }
}

fn parse_secs(name: &'static str, value: Option<String>) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| ConfigError::InvalidDuration { name, value })
}
