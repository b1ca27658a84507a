//! Application configuration management.
//!
//! This module handles loading and saving the client configuration,
//! which includes the API base URL, request timeout, where the session
//! is persisted, and the last used username.
//!
//! Configuration is stored at `~/.config/clipfeed/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "clipfeed";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// API server used when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in seconds.
/// 30s allows for slow uploads of metadata while failing fast enough for good UX.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment override for the API base URL
pub const ENV_API_URL: &str = "CLIPFEED_API_URL";

/// Environment override for the default login name
pub const ENV_USERNAME: &str = "CLIPFEED_USERNAME";

/// Where the credential/identity pair is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStorage {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain entry
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_username: Option<String>,
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub session_storage: SessionStorage,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides (`CLIPFEED_API_URL`, `CLIPFEED_USERNAME`).
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_USERNAME).ok(),
        );
    }

    fn apply_overrides(&mut self, api_url: Option<String>, username: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url.trim().to_string());
        }
        if let Some(name) = username.filter(|u| !u.trim().is_empty()) {
            self.last_username = Some(name.trim().to_string());
        }
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.session_storage, SessionStorage::File);
    }

    #[test]
    fn test_zero_timeout_falls_back_to_default() {
        let config = Config {
            request_timeout_secs: Some(0),
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = Config {
            api_base_url: Some("https://videos.example.com".to_string()),
            last_username: Some("alice".to_string()),
            request_timeout_secs: Some(10),
            session_storage: SessionStorage::Keyring,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url(), "https://videos.example.com");
        assert_eq!(loaded.last_username.as_deref(), Some("alice"));
        assert_eq!(loaded.session_storage, SessionStorage::Keyring);
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.api_base_url.is_none());
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = Config::default();
        config.apply_overrides(Some("  ".to_string()), Some(" bob ".to_string()));
        assert!(config.api_base_url.is_none());
        assert_eq!(config.last_username.as_deref(), Some("bob"));

        config.apply_overrides(Some("http://10.0.0.2:8000".to_string()), None);
        assert_eq!(config.api_base_url(), "http://10.0.0.2:8000");
    }
}
