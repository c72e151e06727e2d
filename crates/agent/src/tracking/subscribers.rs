use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tracing::error;

use domain::models::LocationUpdate;

use crate::sync::lock;

pub type LocationCallback = Arc<dyn Fn(&LocationUpdate) + Send + Sync>;

/// Registered location listeners.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(u64, LocationCallback)>>,
}

impl SubscriberRegistry {
    pub(crate) fn subscribe(self: &Arc<Self>, callback: LocationCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.callbacks).push((id, callback));
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, id: u64) -> bool {
        let mut callbacks = lock(&self.callbacks);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.callbacks).len()
    }

    /// Delivers an update to every subscriber, in registration order.
    ///
    /// The list is snapshotted first so callbacks may subscribe or
    /// unsubscribe without deadlocking.
    pub(crate) fn notify(&self, update: &LocationUpdate) {
        let snapshot: Vec<(u64, LocationCallback)> = lock(&self.callbacks)
            .iter()
            .map(|(id, callback)| (*id, Arc::clone(callback)))
            .collect();

        for (id, callback) in snapshot {
            invoke(id, &callback, update);
        }
    }
}

/// Runs one callback; a panic is logged and does not reach the caller.
pub(crate) fn invoke(id: u64, callback: &LocationCallback, update: &LocationUpdate) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(update))) {
        error!(
            subscriber = id,
            panic = panic_message(panic.as_ref()),
            "Location subscriber panicked"
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle returned by `on_location_update`.
///
/// Dropping it keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Removes the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.unsubscribe(self.id))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}
