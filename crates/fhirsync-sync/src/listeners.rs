//! Subscribe/unsubscribe registry for sync progress events.
//!
//! Subscriptions are scoped: [`SyncListenerRegistry::subscribe`] returns a
//! [`ListenerGuard`], and the listener stays registered exactly as long as
//! the guard is alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::outcome::{PassReport, UploadOutcome};

#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A pass is about to start. `attempt` is 1-based.
    Started { attempt: u32 },
    ItemFinished {
        document_reference_id: String,
        outcome: UploadOutcome,
    },
    Finished { report: PassReport },
    /// A failed pass will be retried after a backoff.
    Retrying { attempt: u32 },
}

/// Receives sync events. Called synchronously on the worker task, so keep it quick.
pub trait SyncListener: Send + Sync {
    fn on_event(&self, event: &SyncEvent);

    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Opaque identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

type Entries = RwLock<Vec<(ListenerHandle, Arc<dyn SyncListener>)>>;

struct Inner {
    listeners: Entries,
    next_handle: AtomicU64,
}

impl Inner {
    fn remove(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        before != listeners.len()
    }
}

/// Registry of sync listeners. Clones share the same subscriptions.
#[derive(Clone)]
pub struct SyncListenerRegistry {
    inner: Arc<Inner>,
}

impl SyncListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: RwLock::new(Vec::new()),
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `listener` until the returned guard is dropped.
    #[must_use = "dropping the guard unsubscribes the listener immediately"]
    pub fn subscribe(&self, listener: Arc<dyn SyncListener>) -> ListenerGuard {
        let handle = ListenerHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!(listener = %listener.name(), handle = handle.0, "Registered sync listener");
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((handle, listener));

        ListenerGuard {
            handle,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.inner.remove(handle)
    }

    /// Calls every listener in subscription order.
    pub fn notify(&self, event: &SyncEvent) {
        // Snapshot so listeners may (un)subscribe from inside on_event
        let listeners: Vec<Arc<dyn SyncListener>> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener.on_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SyncListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Keeps a listener subscribed. Dropping it unsubscribes.
#[derive(Debug)]
pub struct ListenerGuard {
    handle: ListenerHandle,
    registry: Weak<Inner>,
}

impl ListenerGuard {
    pub fn handle(&self) -> ListenerHandle {
        self.handle
    }

    /// Unsubscribes now. Same as dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade()
            && inner.remove(self.handle)
        {
            debug!(handle = self.handle.0, "Unregistered sync listener");
        }
    }
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner").finish_non_exhaustive()
    }
}
