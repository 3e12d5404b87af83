//! Subscriber-based notifications for configuration changes.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed immediately.
pub struct SubscriptionHandle {
    id: usize,
    registry: Weak<RwLock<SubscriberRegistryInner>>,
}

impl SubscriptionHandle {
    /// Keep the subscription alive for as long as the registry exists.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let id = self.id;
            registry.write().subscribers.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

/// Internal subscriber registry state.
struct SubscriberRegistryInner {
    subscribers: Vec<(usize, Callback)>,
    next_id: usize,
}

/// Registry for managing configuration change subscribers.
///
/// Callbacks run on the thread that applied the change, after the new
/// snapshot is published, and outside the registry lock, so a callback may
/// drop its own handle or read the manager it is subscribed to.
///
/// # Examples
///
/// ```rust
/// use kindconf::notify::SubscriberRegistry;
///
/// let registry = SubscriberRegistry::new();
///
/// let handle = registry.subscribe(|| {
///     println!("Config changed!");
/// });
///
/// // Notify all subscribers
/// registry.notify_all();
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// ```
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Subscribe to configuration changes.
    ///
    /// Returns a handle that can be dropped to unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));

        SubscriptionHandle {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Notify all subscribers in subscription order.
    pub fn notify_all(&self) {
        let callbacks: Vec<Callback> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SubscriberRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_and_notify() {
        let registry = SubscriberRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let _handle = registry.subscribe(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify_all();
        registry.notify_all();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_on_drop() {
        let registry = SubscriberRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let counter_clone = Arc::clone(&counter);
        let handle = registry.subscribe(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry.notify_all();
        drop(handle);
        registry.notify_all();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_subscription() {
        let registry = SubscriberRegistry::new();
        registry.subscribe(|| {}).detach();
        assert_eq!(registry.subscriber_count(), 1);
    }

    #[test]
    fn test_handle_outlives_registry() {
        let registry = SubscriberRegistry::new();
        let handle = registry.subscribe(|| {});
        drop(registry);
        drop(handle);
    }

    #[test]
    fn test_clone_registry() {
        let registry = SubscriberRegistry::new();
        let registry2 = registry.clone();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let _handle = registry.subscribe(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });

        registry2.notify_all();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
