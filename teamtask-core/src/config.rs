//! Configuration management

use crate::error::{ErrorContext, TeamtaskError, TeamtaskResult};
use crate::logging::LoggingConfig;
use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Environment variable that overrides `api.base_url`
pub const API_BASE_ENV: &str = "TEAMTASK_API_BASE";

pub const DEFAULT_BASE_URL: &str = "http://team-dashboard-project.local/wp-json";

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamtaskConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base address every request path is appended to
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers sent with every request
    pub headers: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
            user_agent: format!("teamtask/{}", env!("CARGO_PKG_VERSION")),
            headers: HashMap::new(),
        }
    }
}

/// Where the persisted session lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the session file; `~` expands to the home directory
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.teamtask".to_string(),
        }
    }
}

impl TeamtaskConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> TeamtaskResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TeamtaskError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> TeamtaskResult<Self> {
        let mut config: TeamtaskConfig =
            toml::from_str(content).map_err(|e| TeamtaskError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        config.api.base_url = normalize_base_url(&config.api.base_url);
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TeamtaskResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| TeamtaskError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| TeamtaskError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var(API_BASE_ENV) {
            self.set_base_url(&base_url);
        }
    }

    pub fn set_base_url(&mut self, base_url: &str) {
        if !base_url.trim().is_empty() {
            self.api.base_url = normalize_base_url(base_url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> TeamtaskResult<()> {
        if self.api.base_url.is_empty() {
            return Err(TeamtaskError::Config {
                message: "api.base_url must not be empty".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.base_url or the TEAMTASK_API_BASE variable"),
            });
        }

        url::Url::parse(&self.api.base_url).map_err(|e| TeamtaskError::Config {
            message: format!("api.base_url is not a valid URL: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("validate")
                .with_metadata("base_url", &self.api.base_url)
                .with_suggestion("Use an absolute URL such as https://example.com/wp-json"),
        })?;

        if self.api.timeout_seconds == 0 {
            return Err(TeamtaskError::Config {
                message: "api.timeout_seconds must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set api.timeout_seconds to a positive value"),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(TeamtaskError::Config {
                message: "retry.max_attempts must be at least 1".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use 1 to disable retries"),
            });
        }

        Ok(())
    }
}

/// Trim whitespace and trailing slashes so paths can be appended directly
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TeamtaskConfig::default();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TeamtaskConfig::from_toml_str(
            r#"
            [api]
            base_url = "https://tasks.example.com/wp-json///"

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://tasks.example.com/wp-json");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.storage.data_dir, "~/.teamtask");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TeamtaskConfig::default();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = TeamtaskConfig::default();
        config.api.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = TeamtaskConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TeamtaskConfig::from_toml_str("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, TeamtaskError::Config { .. }));
    }

    #[test]
    fn test_set_base_url_ignores_blank() {
        let mut config = TeamtaskConfig::default();
        config.set_base_url("   ");
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        config.set_base_url("http://localhost:8080/wp-json/");
        assert_eq!(config.api.base_url, "http://localhost:8080/wp-json");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = TeamtaskConfig::default();
        config.set_base_url("http://localhost:9000/wp-json");
        config.save_to_file(&path).unwrap();

        let reloaded = TeamtaskConfig::from_file(&path).unwrap();
        assert_eq!(reloaded.api.base_url, "http://localhost:9000/wp-json");
    }
}
