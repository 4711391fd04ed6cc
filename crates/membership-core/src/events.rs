//! Membership diagnostics.
//!
//! The protocol reports table changes through the [`Diagnostics`] trait.
//! Reporting is fire-and-forget and optional: a node without diagnostics
//! behaves exactly like one with them.
//!
//! [`EventBus`] is the stock implementation. It turns each notification into
//! a [`MembershipEvent`] and fans it out to subscribers.

use crate::NodeIdentity;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Sink for membership table changes.
pub trait Diagnostics: Send + Sync {
    /// `observer` inserted `node` into its table.
    fn node_added(&self, observer: NodeIdentity, node: NodeIdentity);

    /// `observer` evicted `node` from its table.
    fn node_removed(&self, observer: NodeIdentity, node: NodeIdentity);
}

/// Membership table changes, as published on the [`EventBus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MembershipEvent {
    /// A node was added to an observer's table.
    NodeAdded {
        observer: NodeIdentity,
        node: NodeIdentity,
    },
    /// A node was removed from an observer's table after timing out.
    NodeRemoved {
        observer: NodeIdentity,
        node: NodeIdentity,
    },
}

impl MembershipEvent {
    pub fn observer(&self) -> NodeIdentity {
        match self {
            Self::NodeAdded { observer, .. } | Self::NodeRemoved { observer, .. } => *observer,
        }
    }

    pub fn node(&self) -> NodeIdentity {
        match self {
            Self::NodeAdded { node, .. } | Self::NodeRemoved { node, .. } => *node,
        }
    }
}

/// Subscription handle that unsubscribes automatically when dropped.
///
/// Follows the disposer pattern: hold this value to keep receiving events,
/// drop it (or let it go out of scope) to unsubscribe.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

type Callback = Arc<dyn Fn(&MembershipEvent) + Send + Sync>;

/// Event bus for publishing membership events to subscribers.
///
/// Wrap in `Arc` to enable subscriptions.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<(usize, Callback)>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events. Returns `Subscription` that unsubscribes on drop.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(&MembershipEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(callback)));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn unsubscribe(&self, id: usize) {
        // try_write: Drop may run during unwinding while emit holds the read lock
        if let Ok(mut guard) = self.callbacks.try_write() {
            guard.retain(|(i, _)| *i != id);
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: MembershipEvent) {
        // Clone the list so a callback may subscribe without deadlocking
        let callbacks: Vec<_> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(&event);
        }
    }
}

impl Diagnostics for EventBus {
    fn node_added(&self, observer: NodeIdentity, node: NodeIdentity) {
        self.emit(MembershipEvent::NodeAdded { observer, node });
    }

    fn node_removed(&self, observer: NodeIdentity, node: NodeIdentity) {
        self.emit(MembershipEvent::NodeRemoved { observer, node });
    }
}
