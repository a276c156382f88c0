//! Persistent notifications
//!
//! Most-recent-first list, capped, written through to a [`StateStore`] on
//! every mutation. Storage failures only cost durability; the in-memory
//! list stays authoritative.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::listeners::{Listeners, Subscription};
use crate::core::storage::{lock, StateStore};

/// Hard cap on stored notifications
pub const MAX_NOTIFICATIONS: usize = 100;

/// Storage key for the notification list
pub const STORAGE_KEY: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    AgentComplete,
    MessageReceived,
    CalendarUpcoming,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::AgentComplete => "agent-complete",
            NotificationKind::MessageReceived => "message-received",
            NotificationKind::CalendarUpcoming => "calendar-upcoming",
            NotificationKind::System => "system",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Input for [`NotificationStore::add`]
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>) -> Self {
        NewNotification {
            kind,
            title: title.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Persistent, capped notification list
#[derive(Clone)]
pub struct NotificationStore {
    items: Arc<Mutex<Arc<Vec<Notification>>>>,
    storage: StateStore,
    listeners: Listeners,
    capacity: usize,
}

impl NotificationStore {
    /// Load from storage with the default cap
    pub fn new(storage: StateStore) -> Self {
        Self::with_capacity(storage, MAX_NOTIFICATIONS)
    }

    /// Load from storage; `capacity` is clamped to `1..=MAX_NOTIFICATIONS`
    pub fn with_capacity(storage: StateStore, capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_NOTIFICATIONS);
        let mut items: Vec<Notification> = storage.load(STORAGE_KEY).unwrap_or_default();
        items.truncate(capacity);

        NotificationStore {
            items: Arc::new(Mutex::new(Arc::new(items))),
            storage,
            listeners: Listeners::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend an unread notification, evicting the oldest past the cap
    pub fn add(&self, new: NewNotification) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            title: new.title,
            body: new.body,
            timestamp: Utc::now(),
            read: false,
        };

        let created = notification.clone();
        self.update(|items| {
            items.insert(0, notification);
            items.truncate(self.capacity);
            true
        });
        created
    }

    /// Mark one notification read. Returns false if it was unknown or already read.
    pub fn mark_read(&self, id: &str) -> bool {
        self.update(|items| match items.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        })
    }

    pub fn mark_all_read(&self) -> bool {
        self.update(|items| {
            let mut changed = false;
            for n in items.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed = true;
            }
            changed
        })
    }

    pub fn remove(&self, id: &str) -> bool {
        self.update(|items| {
            let before = items.len();
            items.retain(|n| n.id != id);
            items.len() != before
        })
    }

    pub fn clear(&self) -> bool {
        self.update(|items| {
            let changed = !items.is_empty();
            items.clear();
            changed
        })
    }

    pub fn unread_count(&self) -> usize {
        self.snapshot().iter().filter(|n| !n.read).count()
    }

    /// Current list, most recent first
    pub fn snapshot(&self) -> Arc<Vec<Notification>> {
        lock(&self.items).clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    /// Apply a mutation to a copy of the list; persist and notify if it changed.
    ///
    /// The write happens under the lock so storage sees mutations in the
    /// same order as the in-memory list.
    fn update<F>(&self, mutate: F) -> bool
    where
        F: FnOnce(&mut Vec<Notification>) -> bool,
    {
        {
            let mut items = lock(&self.items);
            let mut next = (**items).clone();
            if !mutate(&mut next) {
                return false;
            }
            self.storage.save_best_effort(STORAGE_KEY, next.as_slice());
            *items = Arc::new(next);
        }

        self.listeners.notify();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::{KeyValueStore, MemoryStore};

    fn store_with(backend: Arc<MemoryStore>) -> NotificationStore {
        NotificationStore::new(StateStore::new(backend))
    }

    #[test]
    fn test_cap_keeps_most_recent_first() {
        let store = NotificationStore::new(StateStore::in_memory());
        for i in 0..105 {
            store.add(NewNotification::new(NotificationKind::System, format!("n{}", i)));
        }

        let items = store.snapshot();
        assert_eq!(items.len(), MAX_NOTIFICATIONS);
        assert_eq!(items[0].title, "n104");
        assert_eq!(items[99].title, "n5");
    }

    #[test]
    fn test_storage_matches_memory_after_concurrent_writes() {
        let backend = Arc::new(MemoryStore::new());
        let store = store_with(backend.clone());

        std::thread::scope(|scope| {
            for t in 0..4 {
                let store = store.clone();
                scope.spawn(move || {
                    for i in 0..50 {
                        if (t + i) % 7 == 0 {
                            store.clear();
                        } else {
                            store.add(NewNotification::new(
                                NotificationKind::System,
                                format!("t{}-{}", t, i),
                            ));
                        }
                    }
                });
            }
        });

        fn ids(items: &[Notification]) -> Vec<String> {
            items.iter().map(|n| n.id.clone()).collect()
        }
        let reloaded = store_with(backend);
        assert_eq!(ids(&reloaded.snapshot()), ids(&store.snapshot()));
    }

    #[test]
    fn test_reload_from_storage() {
        let backend = Arc::new(MemoryStore::new());
        let store = store_with(backend.clone());
        store.add(NewNotification::new(NotificationKind::System, "X"));

        let reloaded = store_with(backend);
        let items = reloaded.snapshot();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "X");
        assert_eq!(items[0].kind, NotificationKind::System);
        assert_eq!(reloaded.unread_count(), 1);
    }

    #[test]
    fn test_persisted_shape() {
        let backend = Arc::new(MemoryStore::new());
        let store = store_with(backend.clone());
        store.add(NewNotification::new(NotificationKind::AgentComplete, "done").with_body("ok"));

        let raw = backend.get(STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["type"], "agent-complete");
        assert_eq!(value[0]["read"], false);
        assert!(value[0]["timestamp"].is_i64());
    }

    #[test]
    fn test_read_state_and_removal() {
        let store = NotificationStore::new(StateStore::in_memory());
        let a = store.add(NewNotification::new(NotificationKind::System, "a"));
        store.add(NewNotification::new(NotificationKind::System, "b"));

        assert!(store.mark_read(&a.id));
        assert!(!store.mark_read(&a.id));
        assert_eq!(store.unread_count(), 1);

        assert!(store.mark_all_read());
        assert_eq!(store.unread_count(), 0);
        assert!(!store.mark_all_read());

        assert!(store.remove(&a.id));
        assert!(!store.remove("missing"));
        assert_eq!(store.snapshot().len(), 1);

        assert!(store.clear());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let backend = Arc::new(MemoryStore::new());
        backend.seed(STORAGE_KEY, "{not json");
        let store = store_with(backend);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_failing_storage_keeps_memory_state() {
        let backend = Arc::new(MemoryStore::new());
        backend.fail_writes(true);
        let store = store_with(backend.clone());

        store.add(NewNotification::new(NotificationKind::System, "kept"));
        assert_eq!(store.snapshot().len(), 1);
        assert_eq!(backend.get(STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_custom_capacity_is_clamped() {
        assert_eq!(NotificationStore::with_capacity(StateStore::in_memory(), 500).capacity(), 100);
        assert_eq!(NotificationStore::with_capacity(StateStore::in_memory(), 0).capacity(), 1);
    }
}
