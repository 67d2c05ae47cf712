//! Configuration loading for Shellmatch clients
//!
//! Resolution priority for the config file path:
//! 1. `SHELLMATCH_CONFIG` environment variable
//! 2. `~/.config/shellmatch/config.toml` (platform config dir)
//! 3. Compiled defaults (local backend, default timeouts)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    15
}

/// Extended timeout for list/generate operations against the record store.
/// The upstream store may retry once internally on rate limiting, so these
/// calls legitimately run long.
fn default_extended_timeout_secs() -> u64 {
    45
}

/// Settings for one HTTP gateway endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Bearer token for admin endpoints, if the deployment requires one
    pub api_token: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub extended_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            extended_timeout_secs: default_extended_timeout_secs(),
        }
    }
}

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Record store (spreadsheet-backed) gateway
    pub record_store: GatewayConfig,
    /// Review queue gateway
    pub review_queue: GatewayConfig,
    /// Optional webhook URL for commit notifications
    pub notify_webhook: Option<String>,
}

impl TomlConfig {
    /// Load configuration from the resolved path, falling back to compiled
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        match resolve_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                info!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Write configuration to a path (creates parent directories)
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Resolve the config file path: env var first, then the platform config dir
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SHELLMATCH_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("shellmatch").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = TomlConfig::default();
        assert_eq!(config.record_store.connect_timeout_secs, 5);
        assert_eq!(config.record_store.request_timeout_secs, 15);
        assert!(config.record_store.extended_timeout_secs > config.record_store.request_timeout_secs);
        assert!(config.notify_webhook.is_none());
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = TomlConfig::default();
        config.record_store.base_url = "http://records.example:8080".to_string();
        config.review_queue.api_token = Some("secret".to_string());
        config.write_to(&path).unwrap();

        let loaded = TomlConfig::load_from(&path).unwrap();
        assert_eq!(loaded.record_store.base_url, "http://records.example:8080");
        assert_eq!(loaded.review_queue.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[record_store]\nbase_url = \"http://x:1\"\n").unwrap();

        let loaded = TomlConfig::load_from(&path).unwrap();
        assert_eq!(loaded.record_store.base_url, "http://x:1");
        assert_eq!(loaded.record_store.request_timeout_secs, 15);
        assert_eq!(loaded.review_queue.base_url, "http://127.0.0.1:5000");
    }
}
