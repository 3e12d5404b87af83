//! Configuration change notification system.
//!
//! Provides file watching and subscriber-based notifications when configuration is reloaded.

pub mod subscriber;
#[cfg(feature = "file-watch")]
pub mod watcher;

pub use subscriber::{SubscriberRegistry, SubscriptionHandle};
#[cfg(feature = "file-watch")]
pub use watcher::{ConfigWatcher, WatchHandle};
