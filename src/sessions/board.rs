//! Session board
//!
//! Merges two unordered sources, `sessions_list` polls and `session.*`
//! events, by session key. Arrival order is ignored; an update is dropped
//! only if it is older than what the board already holds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{AgentSession, SessionStatus};
use crate::core::listeners::{Listeners, Subscription};
use crate::core::storage::lock;
use crate::gateway::protocol::{EventKind, GatewayEvent, SessionEvent};
use crate::gateway::{GatewayClient, SubscriptionId};

/// A session with its inferred status
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRow {
    pub session: AgentSession,
    pub status: SessionStatus,
}

/// Key-reconciled view of the gateway's sessions
#[derive(Clone, Default)]
pub struct SessionBoard {
    sessions: Arc<Mutex<HashMap<String, AgentSession>>>,
    listeners: Listeners,
}

fn is_stale(stored: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> bool {
    matches!((stored, incoming), (Some(stored), Some(incoming)) if incoming < stored)
}

impl SessionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert polled sessions. Returns how many entries changed.
    pub fn apply_poll(&self, sessions: Vec<AgentSession>) -> usize {
        let changed = {
            let mut board = lock(&self.sessions);
            let mut changed = 0;
            for session in sessions {
                if session.key.is_empty() {
                    continue;
                }
                match board.get(&session.key) {
                    Some(stored) if is_stale(stored.updated_at, session.updated_at) => {}
                    Some(stored) if *stored == session => {}
                    _ => {
                        board.insert(session.key.clone(), session);
                        changed += 1;
                    }
                }
            }
            changed
        };

        if changed > 0 {
            self.listeners.notify();
        }
        changed
    }

    /// Apply a `session.*` event. Other events and keyless payloads are ignored.
    pub fn apply_event(&self, event: &GatewayEvent) -> bool {
        let patch = match event {
            GatewayEvent::SessionCreated(s)
            | GatewayEvent::SessionUpdated(s)
            | GatewayEvent::SessionCompleted(s) => s,
            _ => return false,
        };
        let Some(ref key) = patch.key else {
            return false;
        };

        let changed = {
            let mut board = lock(&self.sessions);
            let entry = board
                .entry(key.clone())
                .or_insert_with(|| AgentSession::new(key.clone()));
            if is_stale(entry.updated_at, patch.updated_at) {
                false
            } else {
                merge(entry, patch);
                true
            }
        };

        if changed {
            self.listeners.notify();
        }
        changed
    }

    /// Feed `session.*` events from the gateway into the board
    pub fn attach(&self, client: &GatewayClient) -> Vec<SubscriptionId> {
        [
            EventKind::SessionCreated,
            EventKind::SessionUpdated,
            EventKind::SessionCompleted,
        ]
        .into_iter()
        .map(|kind| {
            let board = self.clone();
            client.on(kind, move |event| {
                board.apply_event(event);
            })
        })
        .collect()
    }

    /// Look up one session
    pub fn get(&self, key: &str) -> Option<AgentSession> {
        lock(&self.sessions).get(key).cloned()
    }

    /// All sessions with inferred status, most recently updated first
    pub fn rows(&self, now: DateTime<Utc>) -> Vec<SessionRow> {
        let mut rows: Vec<SessionRow> = lock(&self.sessions)
            .values()
            .map(|s| SessionRow {
                status: s.status_at(now),
                session: s.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.session
                .updated_at
                .cmp(&a.session.updated_at)
                .then_with(|| a.session.key.cmp(&b.session.key))
        });
        rows
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Be told when the board changes
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }
}

fn merge(session: &mut AgentSession, patch: &SessionEvent) {
    if patch.status.is_some() {
        session.status = patch.status.clone();
    }
    if patch.updated_at.is_some() {
        session.updated_at = patch.updated_at;
    }
    if patch.model.is_some() {
        session.model = patch.model.clone();
    }
    if let Some(tokens) = patch.total_tokens {
        session.total_tokens = tokens;
    }
    if patch.label.is_some() {
        session.label = patch.label.clone();
    }
}
