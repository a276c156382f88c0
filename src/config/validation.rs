//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::Config;
use crate::notify::inbox::MAX_NOTIFICATIONS;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_gateway_config(config, result);
    result = validate_timing_config(config, result);
    result = validate_notifications_config(config, result);

    result
}

fn validate_gateway_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    match url::Url::parse(&config.gateway.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => {
            result = result.with_error(
                ValidationIssue::new(
                    "gateway.url",
                    format!("Unsupported scheme '{}'", url.scheme()),
                )
                .with_suggestion("Use an http:// or https:// URL; the WebSocket URL is derived from it"),
            );
        }
        Err(e) => {
            result = result.with_error(
                ValidationIssue::new("gateway.url", format!("Invalid URL: {}", e))
                    .with_suggestion("Set OPENCONSOLE_GATEWAY_URL, e.g. http://127.0.0.1:18789"),
            );
        }
    }

    if !config.gateway.ws_path.starts_with('/') {
        result = result.with_error(ValidationIssue::new(
            "gateway.ws_path",
            "WebSocket path must start with '/'",
        ));
    }

    if config.gateway.token.expose_secret().is_empty() {
        result = result.with_warning(
            ValidationIssue::new(
                "gateway.token",
                "No gateway token configured. Authenticated gateways will reject requests.",
            )
            .with_suggestion("Set OPENCONSOLE_TOKEN or run `openconsole login`"),
        );
    }

    result
}

fn validate_timing_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    if config.polling.interval.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "polling.interval",
            "Polling interval must be greater than zero",
        ));
    }

    if config.reconnect.initial_delay.is_zero() {
        result = result.with_error(ValidationIssue::new(
            "reconnect.initial_delay",
            "Reconnect delay must be greater than zero",
        ));
    }

    if config.reconnect.max_delay < config.reconnect.initial_delay {
        result = result.with_error(ValidationIssue::new(
            "reconnect.max_delay",
            "max_delay must not be smaller than initial_delay",
        ));
    }

    if config.reconnect.multiplier < 1.0 {
        result = result.with_error(ValidationIssue::new(
            "reconnect.multiplier",
            "Multiplier below 1.0 would shrink the delay between attempts",
        ));
    }

    if !(0.0..=1.0).contains(&config.reconnect.jitter) {
        result = result.with_error(ValidationIssue::new(
            "reconnect.jitter",
            "Jitter must be between 0.0 and 1.0",
        ));
    }

    result
}

fn validate_notifications_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let capacity = config.notifications.capacity;
    if capacity == 0 || capacity > MAX_NOTIFICATIONS {
        result = result.with_error(ValidationIssue::new(
            "notifications.capacity",
            format!("Capacity must be between 1 and {}", MAX_NOTIFICATIONS),
        ));
    }

    if config.notifications.toast_duration.is_zero() {
        result = result.with_warning(ValidationIssue::new(
            "notifications.toast_duration",
            "Toasts with a zero duration disappear immediately",
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        let result = validate_config(&config);

        // Default config only warns about the missing token
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.iter().any(|w| w.path == "gateway.token"));
    }

    #[test]
    fn test_rejects_websocket_scheme() {
        let mut config = Config::default();
        config.gateway.url = "ws://127.0.0.1:18789".to_string();

        let result = validate_config(&config);
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "gateway.url");
    }

    #[test]
    fn test_rejects_bad_timing_and_capacity() {
        let mut config = Config::default();
        config.polling.interval = Duration::ZERO;
        config.reconnect.max_delay = Duration::from_millis(10);
        config.notifications.capacity = 500;

        let result = validate_config(&config);
        let paths: Vec<_> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"polling.interval"));
        assert!(paths.contains(&"reconnect.max_delay"));
        assert!(paths.contains(&"notifications.capacity"));
    }
}
