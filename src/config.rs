//! CLI configuration.
//!
//! `bolt.yaml` supplies defaults for acquisition and monitoring knobs so
//! they do not have to be repeated on every invocation. Every field has a
//! default; a missing file means default configuration.

use crate::error::{LockError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the bolt CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sleep between contention re-checks during acquire.
    pub retry_interval_ms: u64,

    /// Default acquisition deadline; `None` waits indefinitely.
    pub default_timeout_ms: Option<u64>,

    /// Age cap for staleness, on top of process liveness.
    pub max_holder_age_secs: Option<u64>,

    /// Capacity of the monitor's recent-event buffer.
    pub event_buffer: usize,

    /// Warn when an acquisition waits at least this long.
    pub wait_alert_ms: Option<u64>,

    /// Optional NDJSON event log path.
    pub event_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry_interval_ms: 50,
            default_timeout_ms: None,
            max_holder_age_secs: None,
            event_buffer: 256,
            wait_alert_ms: None,
            event_log: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::io(format!("failed to read config '{}'", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            LockError::Usage(format!("failed to parse config '{}': {}", path.display(), e))
        })
    }

    /// Load from `path` when given and present, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Config::load(p),
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_waits_indefinitely() {
        let config = Config::default();
        assert_eq!(config.retry_interval_ms, 50);
        assert!(config.default_timeout_ms.is_none());
        assert!(config.max_holder_age_secs.is_none());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bolt.yaml");
        std::fs::write(&path, "retry_interval_ms: 10\nmax_holder_age_secs: 300\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retry_interval_ms, 10);
        assert_eq!(config.max_holder_age_secs, Some(300));
        assert_eq!(config.event_buffer, 256);
    }

    #[test]
    fn stray_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bolt.yaml");
        std::fs::write(&path, "retry_interval_ms: 10\nsweep_interval_ms: 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retry_interval_ms, 10);
    }

    #[test]
    fn invalid_yaml_is_a_usage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bolt.yaml");
        std::fs::write(&path, "retry_interval_ms: [nonsense").unwrap();

        assert!(matches!(
            Config::load(&path).unwrap_err(),
            LockError::Usage(_)
        ));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.yaml");
        assert!(Config::load(&missing).is_err());
        assert!(Config::load_or_default(None).is_ok());
    }

    #[test]
    fn config_roundtrips_through_yaml() {
        let config = Config {
            default_timeout_ms: Some(2000),
            event_log: Some(PathBuf::from("/var/log/bolt.ndjson")),
            ..Config::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.default_timeout_ms, Some(2000));
        assert_eq!(parsed.event_log, config.event_log);
    }
}
