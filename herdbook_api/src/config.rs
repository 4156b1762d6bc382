//! Client configuration: base URL and request timeout.

use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Environment variable holding the API base URL.
const ENV_BASE_URL: &str = "HERDBOOK_API_URL";
/// Environment variable overriding the request timeout, in milliseconds.
const ENV_TIMEOUT_MS: &str = "HERDBOOK_TIMEOUT_MS";

/// Configuration for [`crate::ApiClient`].
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the API, without a trailing slash.
    pub base_url: String,
    /// Timeout applied to every request unless overridden per call.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Configuration with the default 30 s timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads `HERDBOOK_API_URL` and optionally `HERDBOOK_TIMEOUT_MS` from the
    /// environment. Returns `None` when the base URL is not set; an
    /// unparsable timeout falls back to the default with a warning.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(ENV_BASE_URL).ok()?;
        let mut config = Self::new(base_url);
        if let Ok(raw) = std::env::var(ENV_TIMEOUT_MS) {
            match raw.parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!("ignoring unparsable {ENV_TIMEOUT_MS}={raw}");
                }
            }
        }
        Some(config)
    }
}
