//! User preferences and saved connection settings
//!
//! Both live in the [`StateStore`]. Unreadable or corrupt values fall back
//! to defaults.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Config;
use crate::core::storage::StateStore;
use crate::error::{Error, Result};

/// Storage key for [`Preferences`]
pub const PREFERENCES_KEY: &str = "preferences";
/// Storage key for [`ConnectionSettings`]
pub const CONNECTION_KEY: &str = "connection";
/// Recent palette picks kept
pub const MAX_RECENT_COMMANDS: usize = 5;

const DEFAULT_ACCENT: &str = "#6366f1";

fn default_accent() -> String {
    DEFAULT_ACCENT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default = "default_accent")]
    pub accent_color: String,
    /// Palette command ids, most recent first
    #[serde(default)]
    pub recent_commands: Vec<String>,
    /// Chat message ids the user has seen
    #[serde(default)]
    pub read_messages: BTreeSet<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            accent_color: default_accent(),
            recent_commands: Vec::new(),
            read_messages: BTreeSet::new(),
        }
    }
}

impl Preferences {
    pub fn load(store: &StateStore) -> Self {
        let mut prefs: Preferences = store.load(PREFERENCES_KEY).unwrap_or_default();
        prefs.recent_commands.truncate(MAX_RECENT_COMMANDS);
        prefs
    }

    /// Persist, logging on failure
    pub fn save(&self, store: &StateStore) -> bool {
        store.save_best_effort(PREFERENCES_KEY, self)
    }

    /// Move `id` to the front of the recent list
    pub fn push_recent(&mut self, id: &str) {
        self.recent_commands.retain(|c| c != id);
        self.recent_commands.insert(0, id.to_string());
        self.recent_commands.truncate(MAX_RECENT_COMMANDS);
    }

    /// Returns false if the message was already marked read
    pub fn mark_message_read(&mut self, id: &str) -> bool {
        self.read_messages.insert(id.to_string())
    }

    pub fn is_message_read(&self, id: &str) -> bool {
        self.read_messages.contains(id)
    }
}

/// Saved gateway endpoint and token.
///
/// Stored as base64 of the reversed JSON text. That keeps the token from
/// being readable at a glance; it is not encryption.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub gateway_url: String,
    pub token: SecretString,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredConnection {
    gateway_url: String,
    #[serde(default)]
    token: String,
}

impl ConnectionSettings {
    pub fn new(gateway_url: impl Into<String>, token: impl Into<String>) -> Self {
        ConnectionSettings {
            gateway_url: gateway_url.into(),
            token: SecretString::from(token.into()),
        }
    }

    /// Obfuscated form
    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_string(&StoredConnection {
            gateway_url: self.gateway_url.clone(),
            token: self.token.expose_secret().to_string(),
        })?;
        let reversed: String = json.chars().rev().collect();
        Ok(STANDARD.encode(reversed))
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Storage(format!("Invalid connection settings encoding: {}", e)))?;
        let reversed = String::from_utf8(bytes)
            .map_err(|e| Error::Storage(format!("Invalid connection settings text: {}", e)))?;
        let json: String = reversed.chars().rev().collect();
        let stored: StoredConnection = serde_json::from_str(&json)?;
        Ok(ConnectionSettings::new(stored.gateway_url, stored.token))
    }

    /// Load saved settings; `None` when absent or unreadable
    pub fn load(store: &StateStore) -> Option<Self> {
        let raw = store.load_raw(CONNECTION_KEY)?;
        match Self::decode(&raw) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Ignoring saved connection settings: {}", e);
                None
            }
        }
    }

    pub fn save(&self, store: &StateStore) -> Result<()> {
        store.save_raw(CONNECTION_KEY, &self.encode()?)
    }

    pub fn forget(store: &StateStore) -> Result<()> {
        store.remove(CONNECTION_KEY)
    }

    /// Fill the gateway URL and token into `config` unless it already has a token.
    ///
    /// Returns whether anything was applied.
    pub fn apply_to(&self, config: &mut Config) -> bool {
        if !config.gateway.token.expose_secret().is_empty() {
            return false;
        }
        if !self.gateway_url.is_empty() {
            config.gateway.url = self.gateway_url.clone();
        }
        config.gateway.token = self.token.clone();
        true
    }
}
