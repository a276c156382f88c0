//! Configuration module - Modular configuration management
//!
//! - types/mod.rs: Core configuration types (Config, NotificationsConfig, etc.)
//! - types/gateway.rs: Gateway endpoint, reconnect and HTTP retry settings
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration and state file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{Config, LogConfig, LogFormat, NotificationsConfig, PollingConfig};

// Re-export gateway types
pub use types::gateway::{GatewayConfig, HttpConfig, ReconnectConfig};

// Re-export IO and utilities
pub use io::{apply_env_overrides, load_config, load_config_from_path, save_config};
pub use paths::{config_dir, config_path, ensure_dir, state_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
