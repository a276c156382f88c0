//! Ephemeral toasts
//!
//! [`ToastStore`] only stores and removes toasts. Expiry belongs to whoever
//! displays them; [`ToastExpiry`] is the stock timer owner for a Tokio
//! runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::listeners::{Listeners, Subscription};
use crate::core::storage::lock;
use crate::error::{Error, Result};

/// Toast lifetime when none is given
pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToastId(u64);

impl std::fmt::Display for ToastId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "toast-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    #[default]
    Info,
    Warning,
}

impl ToastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
            ToastKind::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub kind: ToastKind,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub created_at: DateTime<Utc>,
}

/// Options for [`ToastStore::add`]
#[derive(Debug, Clone, Default)]
pub struct ToastOptions {
    pub kind: ToastKind,
    /// Falls back to the store's default duration
    pub duration: Option<Duration>,
}

impl ToastOptions {
    pub fn kind(kind: ToastKind) -> Self {
        ToastOptions {
            kind,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

struct ToastState {
    next_id: u64,
    toasts: Arc<Vec<Toast>>,
}

/// In-memory toast list with a subscribe/snapshot contract
#[derive(Clone)]
pub struct ToastStore {
    state: Arc<Mutex<ToastState>>,
    listeners: Listeners,
    default_duration: Duration,
}

impl Default for ToastStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastStore {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_TOAST_DURATION)
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        ToastStore {
            state: Arc::new(Mutex::new(ToastState {
                next_id: 1,
                toasts: Arc::new(Vec::new()),
            })),
            listeners: Listeners::new(),
            default_duration,
        }
    }

    /// Append a toast
    pub fn add(&self, message: impl Into<String>, options: ToastOptions) -> ToastId {
        let id = {
            let mut state = lock(&self.state);
            let id = ToastId(state.next_id);
            state.next_id += 1;

            let mut toasts = Vec::with_capacity(state.toasts.len() + 1);
            toasts.extend(state.toasts.iter().cloned());
            toasts.push(Toast {
                id,
                message: message.into(),
                kind: options.kind,
                duration: options.duration.unwrap_or(self.default_duration),
                created_at: Utc::now(),
            });
            state.toasts = Arc::new(toasts);
            id
        };

        self.listeners.notify();
        id
    }

    /// Remove a toast. Unknown ids are a no-op.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let removed = {
            let mut state = lock(&self.state);
            if state.toasts.iter().any(|t| t.id == id) {
                let toasts: Vec<Toast> =
                    state.toasts.iter().filter(|t| t.id != id).cloned().collect();
                state.toasts = Arc::new(toasts);
                true
            } else {
                false
            }
        };

        if removed {
            self.listeners.notify();
        }
        removed
    }

    /// Current toasts in insertion order
    pub fn snapshot(&self) -> Arc<Vec<Toast>> {
        lock(&self.state).toasts.clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn success(&self, message: impl Into<String>) -> ToastId {
        self.add(message, ToastOptions::kind(ToastKind::Success))
    }

    pub fn error(&self, message: impl Into<String>) -> ToastId {
        self.add(message, ToastOptions::kind(ToastKind::Error))
    }

    pub fn info(&self, message: impl Into<String>) -> ToastId {
        self.add(message, ToastOptions::kind(ToastKind::Info))
    }

    pub fn warning(&self, message: impl Into<String>) -> ToastId {
        self.add(message, ToastOptions::kind(ToastKind::Warning))
    }
}

type Timers = Arc<Mutex<HashMap<ToastId, JoinHandle<()>>>>;

/// Dismisses each toast once its duration has elapsed
pub struct ToastExpiry {
    timers: Timers,
    subscription: Option<Subscription>,
}

impl ToastExpiry {
    /// Watch `store` and schedule a timer per toast, including toasts
    /// already present. Requires a Tokio runtime.
    pub fn start(store: &ToastStore) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("Toast expiry needs a Tokio runtime: {}", e)))?;
        let timers: Timers = Arc::default();

        let subscription = {
            let store_ref = store.clone();
            let timers = timers.clone();
            let runtime = runtime.clone();
            store.subscribe(move || reconcile(&store_ref, &timers, &runtime))
        };
        reconcile(store, &timers, &runtime);

        Ok(ToastExpiry {
            timers,
            subscription: Some(subscription),
        })
    }

    /// Number of pending timers
    pub fn pending(&self) -> usize {
        lock(&self.timers).len()
    }

    /// Cancel all outstanding timers and stop watching the store
    pub fn stop(&mut self) {
        self.subscription.take();
        for (_, timer) in lock(&self.timers).drain() {
            timer.abort();
        }
    }
}

impl Drop for ToastExpiry {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reconcile(store: &ToastStore, timers: &Timers, runtime: &Handle) {
    let toasts = store.snapshot();
    let mut pending = lock(timers);

    pending.retain(|id, timer| {
        let live = toasts.iter().any(|t| t.id == *id);
        if !live {
            timer.abort();
        }
        live
    });

    for toast in toasts.iter() {
        if pending.contains_key(&toast.id) {
            continue;
        }
        let id = toast.id;
        let duration = toast.duration;
        let store = store.clone();
        let own_timers = timers.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            // Deregister before dismissing; dismiss re-enters reconcile
            lock(&own_timers).remove(&id);
            debug!(%id, "Toast expired");
            store.dismiss(id);
        });
        pending.insert(id, handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_add_appends_with_defaults() {
        let store = ToastStore::new();
        let first = store.info("one");
        let second = store.add(
            "two",
            ToastOptions::kind(ToastKind::Error).with_duration(Duration::from_secs(1)),
        );

        let toasts = store.snapshot();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].id, first);
        assert_eq!(toasts[0].duration, DEFAULT_TOAST_DURATION);
        assert_eq!(toasts[1].id, second);
        assert_eq!(toasts[1].kind, ToastKind::Error);
    }

    #[test]
    fn test_dismiss_unknown_is_silent() {
        let store = ToastStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let _sub = store.subscribe(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let id = store.info("hello");
        assert!(store.dismiss(id));
        assert!(!store.dismiss(id));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_updated_before_listeners_and_stable() {
        let store = ToastStore::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let s = store.clone();
        let seen_ref = seen.clone();
        let _sub = store.subscribe(move || {
            seen_ref.store(s.snapshot().len(), Ordering::SeqCst);
        });

        let before = store.snapshot();
        store.success("saved");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(before.is_empty());
        assert!(!Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_dismisses_in_order() {
        let store = ToastStore::new();
        let _expiry = ToastExpiry::start(&store).unwrap();

        for ms in [1000, 2000, 3000] {
            store.add(
                format!("{}ms", ms),
                ToastOptions::default().with_duration(Duration::from_millis(ms)),
            );
        }

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let remaining: Vec<_> = store.snapshot().iter().map(|t| t.message.clone()).collect();
        assert_eq!(remaining, vec!["2000ms", "3000ms"]);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_dismiss_cancels_timer() {
        let store = ToastStore::new();
        let expiry = ToastExpiry::start(&store).unwrap();

        let id = store.info("bye");
        assert_eq!(expiry.pending(), 1);
        store.dismiss(id);
        assert_eq!(expiry.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_outstanding_timers() {
        let store = ToastStore::new();
        let mut expiry = ToastExpiry::start(&store).unwrap();
        store.info("stays");

        expiry.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_expiry_requires_runtime() {
        let store = ToastStore::new();
        assert!(matches!(ToastExpiry::start(&store), Err(Error::Internal(_))));
    }
}
