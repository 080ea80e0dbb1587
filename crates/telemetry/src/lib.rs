//! # Telemetry
//!
//! Logging setup shared by the graph replica crates.

pub mod logging;

use serde::{Deserialize, Serialize};

pub use logging::{LogLevel, init_logging};

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Level used when `RUST_LOG` is not set
    pub log_level: LogLevel,
    /// Include the module path of each event
    pub with_target: bool,
    /// Include the emitting thread id
    pub with_thread_ids: bool,
    /// Emit JSON lines instead of human readable text
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            with_target: true,
            with_thread_ids: false,
            json: false,
        }
    }
}

impl TelemetryConfig {
    pub fn with_level(level: LogLevel) -> Self {
        Self {
            log_level: level,
            ..Self::default()
        }
    }
}
