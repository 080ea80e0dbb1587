//! Sync configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telemetry::LogLevel;

use crate::error::SyncError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between inbound polls
    pub poll_interval_ms: u64,
    /// Upper bound on how long the outbound loop sleeps without a wake-up
    pub outbound_wake_timeout_ms: u64,
    /// `false` makes the session write-only
    pub receive_commands: bool,
    /// Extra submit attempts after a failure (0 = fire and forget)
    pub submit_retries: u32,
    /// Backoff step between submit attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    /// How often `finish` re-checks the outgoing queue while draining
    pub drain_poll_interval_ms: u64,
    pub log_level: LogLevel,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            outbound_wake_timeout_ms: 20,
            receive_commands: true,
            submit_retries: 0,
            retry_backoff_ms: 50,
            drain_poll_interval_ms: 20,
            log_level: LogLevel::Info,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SyncError> {
        let config: Self = toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?)
    }

    /// Load from the user config directory, falling back to defaults when
    /// no file exists
    pub fn load_or_default() -> anyhow::Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("graph-replica").join("sync.toml"))
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.outbound_wake_timeout_ms == 0 {
            return Err(SyncError::Config("outbound_wake_timeout_ms must be positive".into()));
        }
        if self.drain_poll_interval_ms == 0 {
            return Err(SyncError::Config("drain_poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn outbound_wake_timeout(&self) -> Duration {
        Duration::from_millis(self.outbound_wake_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = SyncConfig::from_toml_str(
            r#"
            poll_interval_ms = 100
            receive_commands = false
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(!config.receive_commands);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.submit_retries, 0);
        assert_eq!(config.outbound_wake_timeout_ms, 20);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            SyncConfig::from_toml_str("outbound_wake_timeout_ms = 0"),
            Err(SyncError::Config(_))
        ));
        assert!(matches!(
            SyncConfig::from_toml_str("poll_interval_ms = \"soon\""),
            Err(SyncError::Config(_))
        ));
    }
}
