//! Change listeners for snapshot-style stores
//!
//! Stores publish "something changed"; listeners re-read the store's
//! snapshot. Listeners are called after the store has released its own
//! lock, so they may call back into the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

use super::storage::lock;

/// Change callback
pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: BTreeMap<u64, Listener>,
}

/// Set of change listeners owned by a store
#[derive(Clone, Default)]
pub struct Listeners {
    registry: Arc<Mutex<Registry>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it stays registered while the returned handle lives
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.insert(id, Arc::new(listener));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Call every listener in subscription order
    pub fn notify(&self) {
        let listeners: Vec<Listener> = lock(&self.registry).entries.values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        lock(&self.registry).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsubscribes on drop
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe now
    pub fn cancel(self) {}

    /// Keep the listener registered for the lifetime of the store
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).entries.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_notify_and_drop() {
        let listeners = Listeners::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let sub = listeners.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        listeners.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(sub);
        listeners.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_detach_keeps_listener() {
        let listeners = Listeners::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        listeners
            .subscribe(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .detach();
        listeners.notify();
        listeners.notify();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscription_outliving_store_is_harmless() {
        let listeners = Listeners::new();
        let sub = listeners.subscribe(|| {});
        drop(listeners);
        sub.cancel();
    }
}
