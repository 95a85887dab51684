//! Change notification
//!
//! A store publishes a [`ChangeEvent`] after every successful write.
//! Delivery is synchronous: every listener has run before the write call
//! returns, on the caller's thread.

use crate::schema::Field;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What changed in a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A single field was written
    Field(Field),
    /// Several fields changed; consumers should resync everything
    All,
}

/// Receives change events from a store
pub trait ChangeListener: Send + Sync {
    /// Called once per committed write
    fn notify(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn notify(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Handle returned by [`ChangeBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener registry of one store
#[derive(Default)]
pub struct ChangeBus {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn ChangeListener>)>>,
    next_id: AtomicU64,
}

impl ChangeBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, listener));
        tracing::debug!(subscription = id.0, "Change listener registered");
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        let removed = listeners.len() != before;
        if removed {
            tracing::debug!(subscription = id.0, "Change listener removed");
        }
        removed
    }

    /// Deliver `event` to every listener
    pub fn publish(&self, event: &ChangeEvent) {
        // Listeners may (un)subscribe from inside `notify`
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener.notify(event);
        }
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}
