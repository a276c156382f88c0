//! Core module - shared building blocks for the console's stores
//!
//! - `storage.rs`: key-value persistence backends and typed JSON access
//! - `listeners.rs`: change notification for snapshot-style stores

pub mod listeners;
pub mod storage;

pub use listeners::{Listener, Listeners, Subscription};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StateStore};
