//! Client configuration.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STORAGE_KEY: &str = "user";

pub const ENV_BASE_URL: &str = "ADMINCONSOLE_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "ADMINCONSOLE_API_TIMEOUT_MS";
pub const ENV_STORAGE_KEY: &str = "ADMINCONSOLE_STORAGE_KEY";

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Prefix for every relative request path.
    pub base_url: String,
    /// Deadline for each individual network call, refresh included.
    pub timeout: Duration,
    /// Fixed key the session is persisted under.
    pub storage_key: String,
    pub login_path: String,
    pub refresh_path: String,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            login_path: "/auth/login".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            user_agent: concat!("adminconsole/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_auth_paths(mut self, login: impl Into<String>, refresh: impl Into<String>) -> Self {
        self.login_path = login.into();
        self.refresh_path = refresh.into();
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset or invalid values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.timeout = Duration::from_millis(ms),
                _ => tracing::warn!(
                    value = %raw,
                    "{} is not a positive integer; using the default timeout",
                    ENV_TIMEOUT_MS
                ),
            }
        }

        if let Some(key) = lookup(ENV_STORAGE_KEY).filter(|v| !v.trim().is_empty()) {
            config.storage_key = key.trim().to_string();
        }

        config
    }

    /// Resolve a request path against `base_url`. Absolute URLs pass through.
    pub fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
