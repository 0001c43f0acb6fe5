//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend base URL, the HTTP timeout, JPEG quality, where sessions are
//! persisted, and the last used username.
//!
//! Configuration is stored at `~/.config/derma/config.json`. Every field has
//! a default, so a missing or partial file is fine. `DERMA_BASE_URL`
//! overrides the stored base URL.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "derma";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `base_url`
pub const BASE_URL_ENV: &str = "DERMA_BASE_URL";

/// Backend the client talks to when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8089";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// JPEG quality used for uploads (0.8 compression quality).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Where a logged-in session is kept between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    /// Process lifetime only
    #[default]
    Memory,
    /// `session.json` in the cache directory
    File,
    /// OS keychain
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub jpeg_quality: u8,
    pub session_store: SessionStoreKind,
    pub session_max_age_minutes: Option<i64>,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            session_store: SessionStoreKind::default(),
            session_max_age_minutes: None,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::default_path()?)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
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

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Base URL must use http or https: {}", self.base_url);
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            bail!("JPEG quality must be between 1 and 100, got {}", self.jpeg_quality);
        }
        if self.request_timeout_secs == 0 {
            bail!("Request timeout must be at least one second");
        }
        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
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
        assert_eq!(config.base_url, "http://localhost:8089");
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.session_store, SessionStoreKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"base_url": "https://derma.example.com", "session_store": "keyring"}"#)
            .expect("write config");

        let config = Config::load_from(&path).expect("config should load");
        assert_eq!(config.base_url, "https://derma.example.com");
        assert_eq!(config.session_store, SessionStoreKind::Keyring);
        assert_eq!(config.jpeg_quality, DEFAULT_JPEG_QUALITY);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_from(&dir.path().join("absent.json")).expect("config should load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            last_username: Some("alice".to_string()),
            session_store: SessionStoreKind::File,
            ..Config::default()
        };
        config.save_to(&path).expect("config should save");

        let loaded = Config::load_from(&path).expect("config should load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = Config {
            base_url: "ftp://example.com".to_string(),
            ..Config::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_quality = Config {
            jpeg_quality: 0,
            ..Config::default()
        };
        assert!(bad_quality.validate().is_err());

        let bad_timeout = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(bad_timeout.validate().is_err());
    }

    #[test]
    fn test_unknown_store_kind_fails_to_parse() {
        let json = r#"{"session_store": "cloud"}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }
}
