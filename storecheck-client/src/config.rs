//! Client configuration

use std::time::Duration;

/// Client configuration for connecting to the audit backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:3000")
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Maximum login attempts for retriable failures
    pub login_max_attempts: u32,

    /// Base delay for exponential login backoff (doubles per attempt)
    pub login_backoff: Duration,

    /// Maximum age of the last successful biometric or password challenge
    /// before callers should force re-authentication
    pub reauth_max_age: Duration,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: 30,
            login_max_attempts: 3,
            login_backoff: Duration::from_millis(500),
            reauth_max_age: Duration::from_secs(5 * 60),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the login retry policy
    pub fn with_login_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.login_max_attempts = max_attempts.max(1);
        self.login_backoff = backoff;
        self
    }

    /// Set the re-authentication freshness window
    pub fn with_reauth_max_age(mut self, max_age: Duration) -> Self {
        self.reauth_max_age = max_age;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
