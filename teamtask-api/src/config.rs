//! Gateway configuration

use std::collections::HashMap;
use teamtask_core::{RetryConfig, TeamtaskConfig, DEFAULT_BASE_URL};

/// Configuration for the API gateway
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    /// Base URL every request path is appended to
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
    /// Retry policy for transport failures on idempotent requests
    pub retry: RetryConfig,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            user_agent: format!("teamtask/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
            retry: RetryConfig::disabled(),
        }
    }
}

impl From<&TeamtaskConfig> for ApiClientConfig {
    fn from(config: &TeamtaskConfig) -> Self {
        Self {
            base_url: teamtask_core::normalize_base_url(&config.api.base_url),
            timeout_seconds: config.api.timeout_seconds,
            user_agent: config.api.user_agent.clone(),
            headers: config.api.headers.clone(),
            retry: config.retry.clone(),
        }
    }
}

impl ApiClientConfig {
    /// Create a configuration for the given base address
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: teamtask_core::normalize_base_url(base_url.as_ref()),
            ..Default::default()
        }
    }

    /// Set additional header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Join a request path onto the base address
    pub fn endpoint_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
