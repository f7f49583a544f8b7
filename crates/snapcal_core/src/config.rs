//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve database location, vision endpoint and API credentials.
//!
//! # Invariants
//! - Empty or whitespace-only variables count as unset.
//! - API keys never appear in `Debug` output.

use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "SNAPCAL_DB_PATH";
pub const API_KEY_ENV: &str = "SNAPCAL_API_KEY";
pub const API_KEY_FALLBACK_ENV: &str = "GEMINI_API_KEY";
pub const VISION_ENDPOINT_ENV: &str = "SNAPCAL_VISION_ENDPOINT";
pub const VISION_TIMEOUT_ENV: &str = "SNAPCAL_VISION_TIMEOUT_SECS";

const DB_FILE_NAME: &str = "snapcal.sqlite3";
pub const DEFAULT_VISION_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
const DEFAULT_VISION_TIMEOUT_SECS: u64 = 60;

/// Vision endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionConfig {
    /// Full `generateContent` URL, without the `key` query parameter.
    pub endpoint: String,
    pub timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_VISION_TIMEOUT_SECS),
        }
    }
}

impl VisionConfig {
    /// Reads `SNAPCAL_VISION_ENDPOINT` and `SNAPCAL_VISION_TIMEOUT_SECS`.
    ///
    /// Unparseable or zero timeouts fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint = env_non_empty(VISION_ENDPOINT_ENV).unwrap_or(defaults.endpoint);
        let timeout = env_non_empty(VISION_TIMEOUT_ENV)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(defaults.timeout, Duration::from_secs);
        Self { endpoint, timeout }
    }
}

/// API credential for the vision endpoint.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Reads `SNAPCAL_API_KEY`, then `GEMINI_API_KEY`. Missing keys yield empty
    /// credentials, which ingestion rejects before any network call.
    pub fn from_env() -> Self {
        let api_key = env_non_empty(API_KEY_ENV)
            .or_else(|| env_non_empty(API_KEY_FALLBACK_ENV))
            .unwrap_or_default();
        Self { api_key }
    }

    /// Trimmed key, or `None` when empty.
    pub fn api_key(&self) -> Option<&str> {
        let trimmed = self.api_key.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .finish()
    }
}

/// Database file location: `SNAPCAL_DB_PATH` or `<tmp>/snapcal.sqlite3`.
pub fn resolve_db_path() -> PathBuf {
    env_non_empty(DB_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join(DB_FILE_NAME))
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}
