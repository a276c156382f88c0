//! Gateway protocol types
//!
//! Typed view of the event stream. Payloads come from the gateway and are
//! untrusted: every field is optional, and a field of the wrong type decodes
//! as absent rather than rejecting the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;
use super::schema::EventFrame;

// ============================================================================
// Event names
// ============================================================================

/// Event names
pub mod events {
    /// Session created
    pub const SESSION_CREATED: &str = "session.created";
    /// Session updated
    pub const SESSION_UPDATED: &str = "session.updated";
    /// Session completed
    pub const SESSION_COMPLETED: &str = "session.completed";
    /// Agent run finished
    pub const AGENT_COMPLETE: &str = "agent.complete";
    /// Chat message
    pub const CHAT_MESSAGE: &str = "chat.message";
    /// Synthetic: client connection state changed
    pub const CONNECTION_STATE: &str = "connectionState";
}

// ============================================================================
// Connection state
// ============================================================================

/// Event stream connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// `session.*` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Session key
    #[serde(default, deserialize_with = "lenient::string", alias = "sessionKey")]
    pub key: Option<String>,
    /// Backend-reported status
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
    /// Last activity (epoch ms or RFC 3339 on the wire)
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        serialize_with = "chrono::serde::ts_milliseconds_option::serialize"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// Model in use
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: Option<String>,
    /// Token usage so far
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_tokens: Option<u64>,
    /// Display label
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: Option<String>,
}

/// `agent.complete` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCompleteEvent {
    /// Session the agent ran in
    #[serde(default, deserialize_with = "lenient::string", alias = "key")]
    pub session_key: Option<String>,
    /// Agent identifier
    #[serde(default, deserialize_with = "lenient::string")]
    pub agent_id: Option<String>,
    /// Display label
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: Option<String>,
    /// Short result summary
    #[serde(default, deserialize_with = "lenient::string", alias = "result")]
    pub summary: Option<String>,
    /// Final status (e.g. "ok", "failed")
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: Option<String>,
}

/// `chat.message` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageEvent {
    /// Session key
    #[serde(default, deserialize_with = "lenient::string", alias = "key")]
    pub session_key: Option<String>,
    /// Message ID
    #[serde(default, deserialize_with = "lenient::string", alias = "id")]
    pub message_id: Option<String>,
    /// Role (user, assistant, tool, ...)
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: Option<String>,
    /// Message text
    #[serde(default, deserialize_with = "lenient::string", alias = "text")]
    pub content: Option<String>,
    /// Timestamp (epoch ms or RFC 3339 on the wire)
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        serialize_with = "chrono::serde::ts_milliseconds_option::serialize"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

// ============================================================================
// Typed events
// ============================================================================

/// Closed set of event tags used for subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionCreated,
    SessionUpdated,
    SessionCompleted,
    AgentComplete,
    ChatMessage,
    ConnectionState,
    /// Any event name the client does not know
    Unknown,
}

/// A parsed gateway event
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    SessionCreated(SessionEvent),
    SessionUpdated(SessionEvent),
    SessionCompleted(SessionEvent),
    AgentComplete(AgentCompleteEvent),
    ChatMessage(ChatMessageEvent),
    /// Emitted by the client itself on every state transition
    ConnectionState(ConnectionState),
    /// Unrecognised event, or a known name whose payload is not an object
    Unknown {
        event: String,
        data: serde_json::Value,
    },
}

impl GatewayEvent {
    /// Parse a text frame. Returns `None` for anything that is not an event frame.
    pub fn parse(text: &str) -> Option<GatewayEvent> {
        let frame: EventFrame = serde_json::from_str(text).ok()?;
        Some(Self::from_frame(frame))
    }

    /// Decode a frame into a typed event
    pub fn from_frame(frame: EventFrame) -> GatewayEvent {
        fn payload<T: serde::de::DeserializeOwned + Default>(data: &serde_json::Value) -> Option<T> {
            match data {
                serde_json::Value::Null => Some(T::default()),
                serde_json::Value::Object(_) => T::deserialize(data).ok(),
                _ => None,
            }
        }

        let typed = match frame.event.as_str() {
            events::SESSION_CREATED => payload(&frame.data).map(GatewayEvent::SessionCreated),
            events::SESSION_UPDATED => payload(&frame.data).map(GatewayEvent::SessionUpdated),
            events::SESSION_COMPLETED => payload(&frame.data).map(GatewayEvent::SessionCompleted),
            events::AGENT_COMPLETE => payload(&frame.data).map(GatewayEvent::AgentComplete),
            events::CHAT_MESSAGE => payload(&frame.data).map(GatewayEvent::ChatMessage),
            _ => None,
        };

        typed.unwrap_or(GatewayEvent::Unknown {
            event: frame.event,
            data: frame.data,
        })
    }

    /// Subscription tag of this event
    pub fn kind(&self) -> EventKind {
        match self {
            GatewayEvent::SessionCreated(_) => EventKind::SessionCreated,
            GatewayEvent::SessionUpdated(_) => EventKind::SessionUpdated,
            GatewayEvent::SessionCompleted(_) => EventKind::SessionCompleted,
            GatewayEvent::AgentComplete(_) => EventKind::AgentComplete,
            GatewayEvent::ChatMessage(_) => EventKind::ChatMessage,
            GatewayEvent::ConnectionState(_) => EventKind::ConnectionState,
            GatewayEvent::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// Wire name of this event
    pub fn name(&self) -> &str {
        match self {
            GatewayEvent::SessionCreated(_) => events::SESSION_CREATED,
            GatewayEvent::SessionUpdated(_) => events::SESSION_UPDATED,
            GatewayEvent::SessionCompleted(_) => events::SESSION_COMPLETED,
            GatewayEvent::AgentComplete(_) => events::AGENT_COMPLETE,
            GatewayEvent::ChatMessage(_) => events::CHAT_MESSAGE,
            GatewayEvent::ConnectionState(_) => events::CONNECTION_STATE,
            GatewayEvent::Unknown { event, .. } => event,
        }
    }

    /// Session key carried by the event, if any
    pub fn session_key(&self) -> Option<&str> {
        match self {
            GatewayEvent::SessionCreated(s)
            | GatewayEvent::SessionUpdated(s)
            | GatewayEvent::SessionCompleted(s) => s.key.as_deref(),
            GatewayEvent::AgentComplete(a) => a.session_key.as_deref(),
            GatewayEvent::ChatMessage(m) => m.session_key.as_deref(),
            GatewayEvent::ConnectionState(_) => None,
            GatewayEvent::Unknown { data, .. } => data
                .get("sessionKey")
                .or_else(|| data.get("key"))
                .and_then(|v| v.as_str()),
        }
    }
}
