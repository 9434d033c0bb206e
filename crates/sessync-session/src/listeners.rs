//! Change listeners.
//!
//! Every state change is broadcast to the registered listeners in
//! registration order. The list is copied out of the lock before anyone is
//! called, so a listener may add or remove listeners (itself included)
//! without deadlocking; the change applies from the next broadcast.
//!
//! A panicking listener is caught and logged. It does not stop delivery
//! to the listeners after it, and it does not poison the registry.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use crate::SessionSnapshot;

/// The callback type. Listeners run on whatever thread broadcasts, with no
/// session lock held.
pub type Listener = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

/// Handle returned by [`ListenerRegistry::add`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Entries {
    next_id: u64,
    list: Vec<(ListenerId, Listener)>,
}

/// An ordered set of listeners. Cheap to clone; clones share the set.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    entries: Arc<Mutex<Entries>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns its handle.
    pub fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ListenerId(entries.next_id);
        entries.next_id += 1;
        entries.list.push((id, Arc::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.list.len();
        entries.list.retain(|(entry, _)| *entry != id);
        entries.list.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every listener with `snapshot`. Returns how many panicked.
    pub fn notify(&self, snapshot: &SessionSnapshot) -> usize {
        let listeners: Vec<(ListenerId, Listener)> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.list.clone()
        };

        let mut panicked = 0;
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(snapshot))).is_err() {
                panicked += 1;
                tracing::error!(listener = id.0, "session listener panicked");
            }
        }
        panicked
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}
