//! # OpenConsole
//!
//! Operator console for an agent gateway.
//!
//! ## Features
//!
//! - **Live event stream:** WebSocket client with automatic reconnect and typed events
//! - **Tool invocation:** `POST /tools/invoke` and health probes over HTTP
//! - **Session board:** polled and streamed sessions merged by key, with inferred status
//! - **Notifications:** self-expiring toasts plus a persistent, capped inbox
//! - **Command palette:** fuzzy search over navigation and actions with recent picks

pub mod activity;
pub mod config;
pub mod core;
pub mod error;
pub mod format;
pub mod gateway;
pub mod notify;
pub mod palette;
pub mod prefs;
pub mod service;
pub mod sessions;

pub use config::Config;
pub use error::{Error, Result};
pub use service::Console;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
