//! Configuration Management
//!
//! Handles persistent configuration storage for cloudmirror and the cache
//! tuning knobs shared by every module.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default cache lifetime: 30 minutes
const DEFAULT_CACHE_LIFETIME_SECS: u64 = 30 * 60;
/// Default quiet period before change notifications are delivered
const DEFAULT_DEBOUNCE_MS: u64 = 300;
/// Default ceiling on how long a burst of changes may suppress delivery
const DEFAULT_DEBOUNCE_MAX_WAIT_MS: u64 = 3000;
const DEFAULT_NOTIFICATION_HISTORY: usize = 50;

/// Cache tuning shared by all modules of a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// How long a successful listing stays fresh
    pub cache_lifetime: Duration,
    /// Quiet period of the children-changed debouncer
    pub debounce_delay: Duration,
    /// Upper bound on debouncer suppression, `None` for a pure tailing debounce
    pub debounce_max_wait: Option<Duration>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_lifetime: Duration::from_secs(DEFAULT_CACHE_LIFETIME_SECS),
            debounce_delay: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            debounce_max_wait: Some(Duration::from_millis(DEFAULT_DEBOUNCE_MAX_WAIT_MS)),
        }
    }
}

fn default_cache_lifetime_secs() -> u64 {
    DEFAULT_CACHE_LIFETIME_SECS
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_debounce_max_wait_ms() -> u64 {
    DEFAULT_DEBOUNCE_MAX_WAIT_MS
}

fn default_notification_history() -> usize {
    DEFAULT_NOTIFICATION_HISTORY
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Seconds a listing stays fresh before the next read reloads it
    #[serde(default = "default_cache_lifetime_secs")]
    pub cache_lifetime_secs: u64,
    /// Debounce quiet period in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Debounce ceiling in milliseconds (0 disables the ceiling)
    #[serde(default = "default_debounce_max_wait_ms")]
    pub debounce_max_wait_ms: u64,
    /// Notifications kept in history
    #[serde(default = "default_notification_history")]
    pub notification_history: usize,
    /// Last used REST endpoint
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Last used collection path under the endpoint
    #[serde(default)]
    pub collection: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_lifetime_secs: DEFAULT_CACHE_LIFETIME_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            debounce_max_wait_ms: DEFAULT_DEBOUNCE_MAX_WAIT_MS,
            notification_history: DEFAULT_NOTIFICATION_HISTORY,
            endpoint: None,
            collection: None,
        }
    }
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("cloudmirror").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content),
            Err(e) => {
                tracing::warn!("Failed to read {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Parse configuration, falling back to defaults on malformed content
    pub fn from_json(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring malformed config: {}", e);
            Self::default()
        })
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Cache options derived from this configuration
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            cache_lifetime: Duration::from_secs(self.cache_lifetime_secs),
            debounce_delay: Duration::from_millis(self.debounce_ms),
            debounce_max_wait: (self.debounce_max_wait_ms > 0)
                .then(|| Duration::from_millis(self.debounce_max_wait_ms)),
        }
    }

    /// Set endpoint and collection and save
    pub fn set_endpoint(&mut self, endpoint: &str, collection: &str) -> Result<()> {
        self.endpoint = Some(endpoint.to_string());
        self.collection = Some(collection.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = Config::from_json(r#"{"debounce_ms": 100}"#);
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.cache_lifetime_secs, DEFAULT_CACHE_LIFETIME_SECS);
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn test_malformed_config_falls_back() {
        assert_eq!(Config::from_json("not json"), Config::default());
    }

    #[test]
    fn test_zero_max_wait_disables_ceiling() {
        let config = Config {
            debounce_max_wait_ms: 0,
            ..Config::default()
        };
        let options = config.cache_options();
        assert_eq!(options.debounce_max_wait, None);
        assert_eq!(options.debounce_delay, Duration::from_millis(300));
    }

    #[test]
    fn test_default_options_match_config_defaults() {
        assert_eq!(Config::default().cache_options(), CacheOptions::default());
    }
}
