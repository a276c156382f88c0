//! Activity feed
//!
//! A short, most-recent-first log of what the gateway reported, built from
//! every event except the client's own connection-state notices.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::listeners::{Listeners, Subscription};
use crate::core::storage::lock;
use crate::gateway::protocol::{EventKind, GatewayEvent};
use crate::gateway::{EventFilter, GatewayClient, SubscriptionId};

/// Entries kept in the feed
pub const MAX_ACTIVITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub id: u64,
    pub kind: EventKind,
    /// Wire event name
    pub event: String,
    pub summary: String,
    pub session_key: Option<String>,
    pub received_at: DateTime<Utc>,
}

struct FeedState {
    next_id: u64,
    entries: Arc<Vec<ActivityEntry>>,
}

#[derive(Clone)]
pub struct ActivityFeed {
    state: Arc<Mutex<FeedState>>,
    listeners: Listeners,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityFeed {
    pub fn new() -> Self {
        ActivityFeed {
            state: Arc::new(Mutex::new(FeedState {
                next_id: 1,
                entries: Arc::new(Vec::new()),
            })),
            listeners: Listeners::new(),
        }
    }

    /// Record an event. Connection-state events are skipped.
    pub fn record(&self, event: &GatewayEvent) -> Option<ActivityEntry> {
        if event.kind() == EventKind::ConnectionState {
            return None;
        }

        let entry = {
            let mut state = lock(&self.state);
            let entry = ActivityEntry {
                id: state.next_id,
                kind: event.kind(),
                event: event.name().to_string(),
                summary: summarize(event),
                session_key: event.session_key().map(str::to_string),
                received_at: Utc::now(),
            };
            state.next_id += 1;

            let mut entries = Vec::with_capacity(MAX_ACTIVITY);
            entries.push(entry.clone());
            entries.extend(state.entries.iter().take(MAX_ACTIVITY - 1).cloned());
            state.entries = Arc::new(entries);
            entry
        };

        self.listeners.notify();
        Some(entry)
    }

    pub fn snapshot(&self) -> Arc<Vec<ActivityEntry>> {
        lock(&self.state).entries.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Record every event the client delivers
    pub fn attach(&self, client: &GatewayClient) -> SubscriptionId {
        let feed = self.clone();
        client.on(EventFilter::Wildcard, move |event| {
            feed.record(event);
        })
    }
}

/// One-line description of an event
pub fn summarize(event: &GatewayEvent) -> String {
    let key = event.session_key().unwrap_or("unknown session");
    match event {
        GatewayEvent::SessionCreated(_) => format!("Session {} started", key),
        GatewayEvent::SessionUpdated(s) => match s.status.as_deref() {
            Some(status) => format!("Session {} is {}", key, status),
            None => format!("Session {} updated", key),
        },
        GatewayEvent::SessionCompleted(_) => format!("Session {} completed", key),
        GatewayEvent::AgentComplete(a) => {
            let who = a.label.as_deref().or(a.agent_id.as_deref()).unwrap_or(key);
            format!("Agent {} finished", who)
        }
        GatewayEvent::ChatMessage(m) => {
            let role = m.role.as_deref().unwrap_or("someone");
            format!("{} wrote in {}", role, key)
        }
        GatewayEvent::ConnectionState(state) => format!("Gateway {}", state),
        GatewayEvent::Unknown { event, .. } => format!("Event {}", event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::protocol::ConnectionState;

    fn event(json: &str) -> GatewayEvent {
        GatewayEvent::parse(json).unwrap()
    }

    #[test]
    fn test_most_recent_first_and_capped() {
        let feed = ActivityFeed::new();
        for i in 0..60 {
            feed.record(&event(&format!(
                r#"{{"event":"session.updated","data":{{"key":"s{}"}}}}"#,
                i
            )));
        }

        let entries = feed.snapshot();
        assert_eq!(entries.len(), MAX_ACTIVITY);
        assert_eq!(entries[0].session_key.as_deref(), Some("s59"));
        assert_eq!(entries[49].session_key.as_deref(), Some("s10"));
    }

    #[test]
    fn test_skips_connection_state() {
        let feed = ActivityFeed::new();
        assert!(feed
            .record(&GatewayEvent::ConnectionState(ConnectionState::Connected))
            .is_none());
        assert!(feed.snapshot().is_empty());
    }

    #[test]
    fn test_unknown_events_are_recorded() {
        let feed = ActivityFeed::new();
        let entry = feed
            .record(&event(r#"{"event":"cron.tick","data":{"sessionKey":"c1"}}"#))
            .unwrap();
        assert_eq!(entry.kind, EventKind::Unknown);
        assert_eq!(entry.event, "cron.tick");
        assert_eq!(entry.summary, "Event cron.tick");
        assert_eq!(entry.session_key.as_deref(), Some("c1"));
    }

    #[test]
    fn test_summaries() {
        assert_eq!(
            summarize(&event(
                r#"{"event":"session.updated","data":{"key":"s1","status":"running"}}"#
            )),
            "Session s1 is running"
        );
        assert_eq!(
            summarize(&event(r#"{"event":"agent.complete","data":{"agentId":"main"}}"#)),
            "Agent main finished"
        );
        assert_eq!(
            summarize(&event(
                r#"{"event":"chat.message","data":{"sessionKey":"s2","role":"assistant"}}"#
            )),
            "assistant wrote in s2"
        );
    }
}
