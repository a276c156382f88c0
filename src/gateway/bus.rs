//! Typed event bus for gateway events
//!
//! Handlers subscribe to one [`EventKind`] or to every event. Dispatch calls
//! exact-kind handlers first, then wildcard handlers, synchronously on the
//! caller's task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::protocol::{EventKind, GatewayEvent};
use crate::core::storage::lock;

/// Which events a handler receives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Only events of this kind
    Kind(EventKind),
    /// Every parsed event, including unknown names and connection changes
    Wildcard,
}

impl From<EventKind> for EventFilter {
    fn from(kind: EventKind) -> Self {
        EventFilter::Kind(kind)
    }
}

/// Event callback
pub type EventHandler = Arc<dyn Fn(&GatewayEvent) + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    filter: EventFilter,
    handler: EventHandler,
}

/// Publish/subscribe registry
#[derive(Default)]
pub struct EventBus {
    entries: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler
    pub fn on<F>(&self, filter: impl Into<EventFilter>, handler: F) -> SubscriptionId
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.entries).push(Entry {
            id,
            filter: filter.into(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event. Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &GatewayEvent) -> usize {
        let kind = event.kind();

        // Copy handlers out so callbacks may subscribe/unsubscribe re-entrantly
        let (exact, wildcard): (Vec<EventHandler>, Vec<EventHandler>) = {
            let entries = lock(&self.entries);
            let exact = entries
                .iter()
                .filter(|e| e.filter == EventFilter::Kind(kind))
                .map(|e| e.handler.clone())
                .collect();
            let wildcard = entries
                .iter()
                .filter(|e| e.filter == EventFilter::Wildcard)
                .map(|e| e.handler.clone())
                .collect();
            (exact, wildcard)
        };

        for handler in exact.iter().chain(wildcard.iter()) {
            handler(event);
        }
        exact.len() + wildcard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::protocol::ChatMessageEvent;

    fn chat() -> GatewayEvent {
        GatewayEvent::ChatMessage(ChatMessageEvent::default())
    }

    #[test]
    fn test_exact_then_wildcard_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        bus.on(EventFilter::Wildcard, move |_| s.lock().unwrap().push("wildcard"));
        let s = seen.clone();
        bus.on(EventKind::ChatMessage, move |_| s.lock().unwrap().push("exact"));
        let s = seen.clone();
        bus.on(EventKind::AgentComplete, move |_| s.lock().unwrap().push("other"));

        assert_eq!(bus.dispatch(&chat()), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["exact", "wildcard"]);
    }

    #[test]
    fn test_unknown_events_reach_wildcard_only() {
        let bus = EventBus::new();
        let named = Arc::new(AtomicU64::new(0));
        let any = Arc::new(AtomicU64::new(0));

        let n = named.clone();
        bus.on(EventKind::SessionUpdated, move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });
        let a = any.clone();
        bus.on(EventFilter::Wildcard, move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });

        bus.dispatch(&GatewayEvent::Unknown {
            event: "cron.fired".into(),
            data: serde_json::Value::Null,
        });
        assert_eq!(named.load(Ordering::SeqCst), 0);
        assert_eq!(any.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_removes_handler() {
        let bus = EventBus::new();
        let id = bus.on(EventFilter::Wildcard, |_| {});
        assert_eq!(bus.len(), 1);
        assert!(bus.off(id));
        assert!(!bus.off(id));
        assert_eq!(bus.dispatch(&chat()), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let b = bus.clone();
        let s = slot.clone();
        let id = bus.on(EventKind::ChatMessage, move |_| {
            if let Some(id) = *s.lock().unwrap() {
                b.off(id);
            }
        });
        *slot.lock().unwrap() = Some(id);

        assert_eq!(bus.dispatch(&chat()), 1);
        assert_eq!(bus.dispatch(&chat()), 0);
    }
}
