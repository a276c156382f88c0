//! Notifications
//!
//! Two stores with the same subscribe/snapshot contract:
//! - `toast.rs`: ephemeral, self-expiring messages (never persisted)
//! - `inbox.rs`: persistent notification list (capped, most recent first)
//!
//! `bridge.rs` feeds gateway events into the inbox.

pub mod bridge;
pub mod inbox;
pub mod toast;

pub use bridge::notification_for;
pub use inbox::{
    NewNotification, Notification, NotificationKind, NotificationStore, MAX_NOTIFICATIONS,
};
pub use toast::{
    Toast, ToastExpiry, ToastId, ToastKind, ToastOptions, ToastStore, DEFAULT_TOAST_DURATION,
};
