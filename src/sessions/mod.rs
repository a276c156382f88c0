//! Agent sessions as seen by the console
//!
//! Sessions are owned by the gateway; the console only mirrors them:
//! - `status.rs`: recency-based status inference
//! - `board.rs`: key-reconciled view merging polls and streamed events
//! - `poller.rs`: cancellable polling loop

pub mod board;
pub mod poller;
pub mod status;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::protocol::lenient;

pub use board::{SessionBoard, SessionRow};
pub use poller::{SessionPoller, SessionSource, MIN_POLL_INTERVAL};
pub use status::{infer_status, SessionStatus};

/// A session as returned by `sessions_list`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSession {
    /// Session key (e.g. `agent:main:main`)
    pub key: String,
    /// Backend-reported status, if any
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    /// Last activity
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        serialize_with = "chrono::serde::ts_milliseconds_option::serialize"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// Recent messages (opaque)
    #[serde(default, deserialize_with = "lenient::list")]
    pub messages: Vec<serde_json::Value>,
    /// Token usage
    #[serde(default, deserialize_with = "lenient::count_or_zero")]
    pub total_tokens: u64,
    /// Model in use
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: Option<String>,
    /// Display label
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: Option<String>,
    /// Session kind (main, group, cron, ...)
    #[serde(default, deserialize_with = "lenient::string")]
    pub kind: Option<String>,
}

impl AgentSession {
    /// Create a session with just a key
    pub fn new(key: impl Into<String>) -> Self {
        AgentSession {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Inferred status at `now`
    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        infer_status(self.status.as_deref(), self.updated_at, now)
    }

    /// Label if set, otherwise the key
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }
}
