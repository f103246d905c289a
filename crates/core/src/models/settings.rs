use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::ClientError;

pub const ENV_BASE_URL: &str = "PORTFOLIO_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "PORTFOLIO_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "PORTFOLIO_MAX_RETRIES";
pub const ENV_SESSION_FILE: &str = "PORTFOLIO_SESSION_FILE";

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;
const DEFAULT_HISTORY_MONTHS: u32 = 1;

/// How the session credential travels with authorised requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScheme {
    /// Server-side session cookie set by `/login`.
    #[default]
    Cookie,
    /// Token from the `/login` body, sent as a bearer header.
    Bearer,
}

/// Client configuration: defaults, then an optional JSON file, then environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend root, e.g. "https://portfolio.example.com".
    pub base_url: String,

    /// Per-request timeout. A request that never resolves would otherwise
    /// leave its view awaiting forever.
    pub request_timeout_secs: u64,

    /// Retries for idempotent GETs on connect errors, timeouts and 5xx.
    pub max_retries: u32,

    /// Base delay of the exponential backoff between retries.
    pub retry_base_delay_ms: u64,

    pub auth_scheme: AuthScheme,

    /// Where the encrypted session record lives, if persisted at all.
    pub session_file: Option<PathBuf>,

    /// Length of the default history window when no dates are given.
    pub default_history_months: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            auth_scheme: AuthScheme::default(),
            session_file: None,
            default_history_months: DEFAULT_HISTORY_MONTHS,
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ClientError> {
        let settings: Settings = serde_json::from_str(json)
            .map_err(|e| ClientError::InvalidConfig(format!("Failed to parse settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file (native only).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ClientError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut settings = Self::default();
        settings.apply_env()?;
        Ok(settings)
    }

    /// Apply `PORTFOLIO_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ClientError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = raw.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("{ENV_TIMEOUT_SECS} must be an integer, got '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = raw.trim().parse().map_err(|_| {
                ClientError::InvalidConfig(format!("{ENV_MAX_RETRIES} must be an integer, got '{raw}'"))
            })?;
        }
        if let Some(path) = lookup(ENV_SESSION_FILE) {
            self.session_file = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        self.validate()
    }

    /// Reject settings the client cannot run with.
    pub fn validate(&self) -> Result<(), ClientError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ClientError::InvalidConfig("base_url must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got '{url}'"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.default_history_months == 0 {
            return Err(ClientError::InvalidConfig(
                "default_history_months must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// `base_url` without a trailing slash.
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}
