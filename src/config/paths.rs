//! Configuration paths
//!
//! Utilities for resolving configuration and state file paths.

use std::path::{Path, PathBuf};

/// Get the configuration directory
pub fn config_dir() -> PathBuf {
    // Check for explicit override
    if let Ok(dir) = std::env::var("OPENCONSOLE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    // Use XDG config directory or fallback
    dirs::config_dir()
        .map(|d| d.join("openconsole"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".config").join("openconsole"))
                .unwrap_or_else(|| PathBuf::from(".openconsole"))
        })
}

/// Get the main configuration file path
///
/// Prefers `config.json`, falls back to `config.toml` when only that exists.
pub fn config_path() -> PathBuf {
    // Check for explicit override
    if let Ok(path) = std::env::var("OPENCONSOLE_CONFIG") {
        return PathBuf::from(path);
    }

    let dir = config_dir();
    let toml = dir.join("config.toml");
    let json = dir.join("config.json");
    if !json.exists() && toml.exists() {
        toml
    } else {
        json
    }
}

/// Get the state directory (notifications, preferences, connection settings)
pub fn state_dir() -> PathBuf {
    // Check for explicit override
    if let Ok(dir) = std::env::var("OPENCONSOLE_STATE_DIR") {
        return PathBuf::from(dir);
    }

    // Use XDG data directory or fallback
    dirs::data_dir()
        .map(|d| d.join("openconsole"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|h| h.join(".local").join("share").join("openconsole"))
                .unwrap_or_else(|| PathBuf::from(".openconsole"))
        })
}

/// Ensure a directory exists
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_paths() {
        // Just ensure these don't panic
        let _ = config_dir();
        let _ = config_path();
        let _ = state_dir();
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Second call is a no-op
        ensure_dir(&nested).unwrap();
    }
}
