use std::time::Duration;

/// Default base URL of the extraction sidecar.
pub const DEFAULT_SOURCE_URL: &str = "http://localhost:9877";

/// Runtime configuration describing how to reach the extraction sidecar.
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Per-request ceiling enforced by the HTTP client itself.
    pub request_timeout: Duration,
}

impl HttpSourceConfig {
    /// Construct a configuration for `base_url`.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout,
        }
    }

    /// Build a configuration from `ITEM_SOURCE_URL`, falling back to [`DEFAULT_SOURCE_URL`].
    pub fn from_env(request_timeout: Duration) -> Self {
        let base_url = std::env::var("ITEM_SOURCE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());
        Self::new(base_url, request_timeout)
    }
}
