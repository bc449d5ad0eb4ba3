//! Live query subscriptions over the place store.
//!
//! # Responsibility
//! - Track observers of "all places" and "one place by id" queries.
//! - Hand out cancellable `Subscription` handles.
//!
//! # Invariants
//! - Observers are invoked outside the registry lock, while their own slot
//!   is locked.
//! - A dropped or cancelled subscription receives no further values.

use crate::model::place::{Place, PlaceId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Observer of the full place list, newest first.
pub type PlacesObserver = Box<dyn FnMut(&[Place]) + Send>;
/// Observer of a single place; `None` when the row does not exist.
pub type PlaceObserver = Box<dyn FnMut(Option<&Place>) + Send>;

pub(crate) enum Watcher {
    All(PlacesObserver),
    ById(PlaceId, PlaceObserver),
}

pub(crate) type WatcherSlot = Arc<Mutex<Watcher>>;

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    watchers: Mutex<BTreeMap<u64, WatcherSlot>>,
}

/// Registry of active live queries.
#[derive(Default)]
pub(crate) struct LiveRegistry {
    inner: Arc<RegistryInner>,
}

impl LiveRegistry {
    /// Adds `slot` to the registry. Callers may hold the slot's lock while
    /// registering to deliver an initial value before any publisher does.
    pub(crate) fn register(&self, slot: WatcherSlot) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.watchers).insert(id, slot);
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Clones the current watcher set so callers can notify without holding
    /// the registry lock.
    pub(crate) fn snapshot(&self) -> Vec<WatcherSlot> {
        lock(&self.inner.watchers).values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner.watchers).len()
    }
}

/// Handle for an active live query.
///
/// Dropping the handle cancels the subscription.
#[must_use = "dropping a Subscription cancels it immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<RegistryInner>,
}

impl Subscription {
    /// Stops delivery to this subscription's observer.
    pub fn cancel(self) {}

    /// Returns whether the observer is still registered.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|inner| lock(&inner.watchers).contains_key(&self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            lock(&inner.watchers).remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Locks a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
