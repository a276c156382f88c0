//! Gateway connection configuration types
//!
//! Where the gateway lives, how to authenticate, and how hard to try when
//! the event stream drops.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

/// Gateway endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base HTTP URL of the gateway (e.g. `http://127.0.0.1:18789`)
    #[serde(default = "default_url")]
    pub url: String,
    /// Bearer token sent on every HTTP request and the WebSocket upgrade
    #[serde(skip_serializing, default = "default_secret")]
    pub token: SecretString,
    /// Path of the event stream endpoint, appended to the WebSocket URL
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    /// Timeout for `/health` probes
    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,
    /// Timeout for `/tools/invoke` requests
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            url: default_url(),
            token: default_secret(),
            ws_path: default_ws_path(),
            health_timeout: default_health_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_url() -> String {
    "http://127.0.0.1:18789".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Reconnect backoff for the event stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound for any single reconnect delay
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
    /// Growth factor between attempts
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Randomization factor (0.0 = no jitter)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

/// HTTP retry policy for tool invocations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Maximum retries for transient failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            max_retries: default_retries(),
        }
    }
}

fn default_retries() -> u32 {
    2
}
