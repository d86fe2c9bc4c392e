// ── Listener fan-out ──
//
// Minimal synchronous pub-sub. Callbacks run on the publisher's task, so
// they must be quick; a panicking callback is logged and skipped.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::error;
use uuid::Uuid;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub struct Listeners<E> {
    channel: &'static str,
    subscribers: DashMap<ListenerId, Callback<E>>,
}

impl<E> Listeners<E> {
    /// `channel` names this fan-out in log output.
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            subscribers: DashMap::new(),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        self.subscribers.insert(id, Arc::new(callback));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    /// Deliver `event` to every subscriber.
    ///
    /// Callbacks are collected first, so a callback may (un)subscribe
    /// without deadlocking.
    pub fn publish(&self, event: &E) {
        let callbacks: Vec<(ListenerId, Callback<E>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (id, callback) in callbacks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(event))) {
                error!(
                    channel = self.channel,
                    listener = %id,
                    panic = %panic_message(payload.as_ref()),
                    "listener panicked"
                );
            }
        }
    }

    pub fn clear(&self) {
        self.subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}
