//! Configuration types module
//!
//! Re-exports all configuration types.

pub mod gateway;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gateway endpoint and credentials
    #[serde(default)]
    pub gateway: gateway::GatewayConfig,

    /// Event stream reconnect policy
    #[serde(default)]
    pub reconnect: gateway::ReconnectConfig,

    /// HTTP retry policy
    #[serde(default)]
    pub http: gateway::HttpConfig,

    /// Notification settings
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Session polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Logging
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from environment variables and files
    ///
    /// Layers, lowest precedence first:
    /// 1. Default values
    /// 2. Config file (if present)
    /// 3. Environment variable overrides
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Maximum persisted notifications
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Default toast lifetime
    #[serde(default = "default_toast_duration", with = "humantime_serde")]
    pub toast_duration: Duration,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        NotificationsConfig {
            capacity: default_capacity(),
            toast_duration: default_toast_duration(),
        }
    }
}

fn default_capacity() -> usize {
    crate::notify::inbox::MAX_NOTIFICATIONS
}

fn default_toast_duration() -> Duration {
    crate::notify::toast::DEFAULT_TOAST_DURATION
}

/// Session polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between `sessions_list` polls
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub interval: Duration,
    /// Maximum sessions requested per poll
    #[serde(default = "default_poll_limit")]
    pub limit: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingConfig {
            interval: default_poll_interval(),
            limit: default_poll_limit(),
        }
    }
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_poll_limit() -> u32 {
    50
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(crate::error::Error::Config(format!(
                "Invalid log format: {}. Valid options: pretty, json",
                s
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "openconsole=info".to_string()
}
