//! Client-wide and per-request configuration.

use std::env;
use std::time::Duration;

use crate::error::RequestError;

/// Timeout applied to every request unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "FOLIO_BASE_URL";

/// Environment variable holding an optional timeout in milliseconds.
pub const TIMEOUT_ENV: &str = "FOLIO_TIMEOUT_MS";

/// Settings fixed at client construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `FOLIO_BASE_URL` and, if set, `FOLIO_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, RequestError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RequestError> {
        let base_url = lookup(BASE_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RequestError::Config(format!("{BASE_URL_ENV} is not set")))?;
        let mut config = Self::new(base_url.trim());
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let millis: u64 = raw
                .trim()
                .parse()
                .map_err(|_| RequestError::Config(format!("{TIMEOUT_ENV} is not a number: {raw}")))?;
            if millis == 0 {
                return Err(RequestError::Config(format!(
                    "{TIMEOUT_ENV} must be greater than zero"
                )));
            }
            config.timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Resolve a request URL against the base URL. Absolute URLs are used
    /// as-is.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") || self.base_url.is_empty() {
            return url.to_string();
        }
        if url.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{}", self.base_url, url.trim_start_matches('/'))
    }
}

/// Per-request overrides layered on top of `ClientConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfig {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
