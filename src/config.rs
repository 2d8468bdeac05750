use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::github::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .review-anchor.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub placement: PlacementConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API root; override for GitHub Enterprise.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Upper bound on a single HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per comment for 5xx and network failures
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Number of posting workers
    pub workers: usize,
    /// Deadline for the whole batch; no new posts start after it passes
    pub timeout_secs: u64,
    /// Always post one summary comment instead of inline comments
    pub always_aggregate: bool,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_secs: 120,
            always_aggregate: false,
        }
    }
}

impl Config {
    /// Load configuration from .review-anchor.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".review-anchor.toml");
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        if config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                config.github.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            backoff: Duration::from_millis(self.retry.backoff_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.github.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.placement.workers, 4);
        assert!(!config.placement.always_aggregate);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
api_url = "https://ghe.example.com/api/v3"
request_timeout_secs = 10

[retry]
backoff_ms = 50

[placement]
workers = 2
always_aggregate = true
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry_policy().backoff, Duration::from_millis(50));
        assert_eq!(config.placement.workers, 2);
        assert_eq!(config.placement.timeout_secs, 120);
        assert!(config.placement.always_aggregate);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("review_anchor_test_config.toml");
        std::fs::write(&path, "[github]\ntoken = \"from-file\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.github_token().as_deref(), Some("from-file"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_invalid_file() {
        let path = std::env::temp_dir().join("review_anchor_bad_config.toml");
        std::fs::write(&path, "[placement]\nworkers = \"many\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_file(&path).ok();
    }
}
