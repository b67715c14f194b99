//! Configuration management for supahack.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (SUPAHACK_*)
//! 2. Config file (~/.supahack/config.toml, or SUPAHACK_CONFIG)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use supahack_core::client::RestEndpoint;

use crate::error::CliError;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// PostgREST settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,

    /// Output settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed REST base URL (self-hosted or local stack)
    #[serde(default)]
    pub rest_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for supahack data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Connection store database; defaults to `<data_dir>/store.db`
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Rows per page for `rows`
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Count rows when listing tables
    #[serde(default = "default_true")]
    pub auto_counts: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit logs as JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "supahack", "supahack") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".supahack")
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rest_url: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            store_path: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            auto_counts: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file, falling back to defaults
    /// when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config = toml::from_str(&content)
            .map_err(CliError::from)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("SUPAHACK_REST_URL").filter(|u| !u.trim().is_empty()) {
            self.api.rest_url = Some(url);
        }
        if let Some(json) = var("SUPAHACK_LOG_JSON") {
            self.logging.json = matches!(json.trim(), "1" | "true" | "yes");
        }
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SUPAHACK_CONFIG") {
            PathBuf::from(path)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".supahack")
                .join("config.toml")
        }
    }

    /// Connection store location.
    pub fn store_path(&self) -> PathBuf {
        self.paths
            .store_path
            .clone()
            .unwrap_or_else(|| self.paths.data_dir.join("store.db"))
    }

    pub fn endpoint(&self) -> RestEndpoint {
        RestEndpoint::from_override(self.api.rest_url.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.data_dir).context("Failed to create data directory")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.api.rest_url.is_none());
        assert_eq!(config.display.page_size, 100);
        assert!(config.display.auto_counts);
        assert!(!config.logging.json);
        assert_eq!(config.endpoint(), RestEndpoint::Hosted);
        assert_eq!(config.store_path(), config.paths.data_dir.join("store.db"));
    }

    #[test]
    fn test_load_partial_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[api]\nrest_url = \"http://localhost:54321/rest/v1\"\n\n[display]\npage_size = 25\n",
        )
        .expect("Failed to write config");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(
            config.endpoint(),
            RestEndpoint::Fixed("http://localhost:54321/rest/v1".into())
        );
        assert_eq!(config.display.page_size, 25);
        assert!(config.display.auto_counts);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config::load_from(&temp.path().join("missing.toml")).expect("Failed to load");
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[api\n").expect("Failed to write config");
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides_rest_url() {
        let mut config = Config::default();
        config.apply_env(|key| (key == "SUPAHACK_REST_URL").then(|| "http://127.0.0.1:3000".to_string()));
        assert_eq!(config.endpoint(), RestEndpoint::Fixed("http://127.0.0.1:3000".into()));

        let mut config = Config::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config.endpoint(), RestEndpoint::Hosted);
    }

    #[test]
    fn test_json_logging_from_file_and_env() {
        let temp = tempdir().expect("Failed to create temp dir");
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[logging]\njson = true\n").expect("Failed to write config");
        let mut config = Config::load_from(&path).expect("Failed to load config");
        assert!(config.logging.json);

        config.apply_env(|key| (key == "SUPAHACK_LOG_JSON").then(|| "0".to_string()));
        assert!(!config.logging.json);
        config.apply_env(|key| (key == "SUPAHACK_LOG_JSON").then(|| "true".to_string()));
        assert!(config.logging.json);
    }

    #[test]
    fn test_ensure_dirs_creates_data_dir() {
        let temp = tempdir().expect("Failed to create temp dir");
        let config = Config {
            paths: PathsConfig {
                data_dir: temp.path().join("data"),
                store_path: None,
            },
            ..Config::default()
        };

        assert!(!config.paths.data_dir.exists());
        config.ensure_dirs().expect("Failed to create directories");
        assert!(config.paths.data_dir.exists());
    }
}
