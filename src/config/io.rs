//! Reading and writing the console config file
//!
//! Files are JSON5 or TOML; `OPENCONSOLE_*` variables (and `.env`) overlay them.

use std::path::Path;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration with layered precedence:
/// 1. Config file (config.json / config.toml) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides (highest precedence)
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set environment variables.
/// Precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    use secrecy::SecretString;

    dotenvy::dotenv().ok();

    if let Ok(url) = std::env::var("OPENCONSOLE_GATEWAY_URL") {
        config.gateway.url = url;
    }
    if let Ok(token) = std::env::var("OPENCONSOLE_TOKEN") {
        config.gateway.token = SecretString::from(token);
    }
    if let Ok(path) = std::env::var("OPENCONSOLE_WS_PATH") {
        config.gateway.ws_path = path;
    }
    if let Ok(interval) = std::env::var("OPENCONSOLE_POLL_INTERVAL") {
        if let Ok(v) = humantime_serde::re::humantime::parse_duration(&interval) {
            config.polling.interval = v;
        }
    }
    if let Ok(retries) = std::env::var("OPENCONSOLE_MAX_RETRIES") {
        if let Ok(v) = retries.parse() {
            config.http.max_retries = v;
        }
    }
    if let Ok(format) = std::env::var("OPENCONSOLE_LOG_FORMAT") {
        if let Ok(v) = format.parse() {
            config.log.format = v;
        }
    }
}

/// Save configuration to a file
///
/// The gateway token is never written; keep it in the environment or in the
/// stored connection settings.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config).map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}
