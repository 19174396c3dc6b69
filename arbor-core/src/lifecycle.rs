//! Lifecycle Events
//!
//! Every component carries a small event bus. The component dispatches
//! mount and update events around each pass and re-dispatches every input
//! notification as [`LifecycleEvent::Changed`]. Listeners are grouped by
//! [`EventKind`] and called in subscription order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::tracking::{Change, ChangeKind};

/// An event dispatched on a component's lifecycle bus.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The component was connected; the first pass has been requested.
    WillMount,
    /// The first pass was committed.
    DidMount,
    /// A pass is about to regenerate the tree.
    WillUpdate,
    /// A pass was committed.
    DidUpdate,
    /// A named input changed.
    Changed(Change),
}

impl LifecycleEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::WillMount => EventKind::WillMount,
            Self::DidMount => EventKind::DidMount,
            Self::WillUpdate => EventKind::WillUpdate,
            Self::DidUpdate => EventKind::DidUpdate,
            Self::Changed(change) => match change.kind() {
                ChangeKind::Attribute => EventKind::AttributeChanged,
                ChangeKind::State => EventKind::StateChanged,
                ChangeKind::Children => EventKind::ChildrenChanged,
            },
        }
    }
}

/// Subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    WillMount,
    DidMount,
    WillUpdate,
    DidUpdate,
    AttributeChanged,
    StateChanged,
    ChildrenChanged,
}

/// Identifies one listener for [`Lifecycle::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Listener = Rc<dyn Fn(&LifecycleEvent)>;

#[derive(Clone)]
struct Subscription {
    id: SubscriptionId,
    once: bool,
    listener: Listener,
}

/// Listener table keyed by event kind.
#[derive(Default)]
pub struct Lifecycle {
    table: RefCell<IndexMap<EventKind, SmallVec<[Subscription; 2]>>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for every event of `kind`.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&LifecycleEvent) + 'static) -> SubscriptionId {
        self.subscribe(kind, false, Rc::new(listener))
    }

    /// Listen for the next event of `kind` only.
    pub fn once(&self, kind: EventKind, listener: impl Fn(&LifecycleEvent) + 'static) -> SubscriptionId {
        self.subscribe(kind, true, Rc::new(listener))
    }

    /// Remove a listener. Returns whether it was still subscribed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut table = self.table.borrow_mut();
        for subscriptions in table.values_mut() {
            if let Some(idx) = subscriptions.iter().position(|sub| sub.id == id) {
                subscriptions.remove(idx);
                return true;
            }
        }
        false
    }

    /// Call every listener of the event's kind. Listeners added during
    /// dispatch first see the next event.
    pub fn dispatch(&self, event: &LifecycleEvent) {
        let kind = event.kind();
        let listeners: SmallVec<[Listener; 4]> = {
            let mut table = self.table.borrow_mut();
            let Some(subscriptions) = table.get_mut(&kind) else {
                return;
            };
            let listeners = subscriptions.iter().map(|sub| Rc::clone(&sub.listener)).collect();
            subscriptions.retain(|sub| !sub.once);
            listeners
        };

        trace!(?kind, listeners = listeners.len(), "lifecycle event");
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.table.borrow().get(&kind).map_or(0, SmallVec::len)
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    fn subscribe(&self, kind: EventKind, once: bool, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.table
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Subscription { id, once, listener });
        id
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.borrow();
        f.debug_map()
            .entries(table.iter().map(|(kind, subs)| (kind, subs.len())))
            .finish()
    }
}
