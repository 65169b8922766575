use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server-side video processing is slow, so the request budget is long.
pub const DEFAULT_TIMEOUT_SECS: u64 = 900;
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Advisory upload cap. Staging larger files only logs a warning; the
/// server remains the authority on what it accepts.
pub const ADVISORY_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Connection settings for the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL without a trailing slash, so path joins stay predictable.
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}
