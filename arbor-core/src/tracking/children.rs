//! Child Collections
//!
//! A child collection tracks the host children of a component element that
//! satisfy a filter. External producers report raw mutations
//! ([`ChildMutations`]); the collection classifies them against its current
//! membership and produces the final [`ChildChanges`].
//!
//! A child whose attributes or content changed may start or stop matching
//! the filter, so those buckets can also produce additions and removals.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::change::{Change, ChangeSink};
use crate::host::NodeId;

/// Final, classified changes to a child collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildChanges {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub content_changed: Vec<NodeId>,
    pub attribute_changed: Vec<NodeId>,
}

impl ChildChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.content_changed.is_empty()
            && self.attribute_changed.is_empty()
    }
}

/// Raw mutations reported by whoever observes the host children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildMutations {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    pub content_changed: Vec<NodeId>,
    pub attribute_changed: Vec<NodeId>,
}

impl ChildMutations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn added(mut self, node: NodeId) -> Self {
        self.added.push(node);
        self
    }

    pub fn removed(mut self, node: NodeId) -> Self {
        self.removed.push(node);
        self
    }

    pub fn content_changed(mut self, node: NodeId) -> Self {
        self.content_changed.push(node);
        self
    }

    pub fn attribute_changed(mut self, node: NodeId) -> Self {
        self.attribute_changed.push(node);
        self
    }
}

type Filter = Box<dyn Fn(NodeId) -> bool>;
type Policy = Box<dyn Fn(&[NodeId], &ChildChanges) -> bool>;

/// Default update policy: any non-empty bucket.
pub fn any_change(_current: &[NodeId], changes: &ChildChanges) -> bool {
    !changes.is_empty()
}

/// Filtered view over a component's host children. Clones share state.
pub struct ChildCollection {
    inner: Rc<CollectionInner>,
}

struct CollectionInner {
    name: String,
    filter: Filter,
    policy: Policy,
    current: RefCell<Vec<NodeId>>,
    sink: RefCell<Option<Weak<dyn ChangeSink>>>,
}

impl ChildCollection {
    pub fn new(name: &str, filter: impl Fn(NodeId) -> bool + 'static) -> Self {
        Self::with_policy(name, filter, any_change)
    }

    /// Create a collection with a custom `should_request_update` policy.
    pub fn with_policy(
        name: &str,
        filter: impl Fn(NodeId) -> bool + 'static,
        policy: impl Fn(&[NodeId], &ChildChanges) -> bool + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                name: name.to_string(),
                filter: Box::new(filter),
                policy: Box::new(policy),
                current: RefCell::new(Vec::new()),
                sink: RefCell::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current members in insertion order.
    pub fn current(&self) -> Vec<NodeId> {
        self.inner.current.borrow().clone()
    }

    /// Populate from the host children present at mount. Every matching
    /// child is reported as added.
    pub fn initialize(&self, children: &[NodeId]) -> ChildChanges {
        let matching: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|&node| (self.inner.filter)(node))
            .collect();

        *self.inner.current.borrow_mut() = matching.clone();
        let changes = ChildChanges {
            added: matching,
            ..ChildChanges::default()
        };
        self.publish(&changes);
        changes
    }

    /// Classify raw mutations against the current membership.
    pub fn observe(&self, mutations: ChildMutations) -> ChildChanges {
        let filter = &self.inner.filter;
        let mut changes = ChildChanges::default();

        {
            let mut current = self.inner.current.borrow_mut();

            for &node in &mutations.removed {
                if let Some(idx) = current.iter().position(|&n| n == node) {
                    current.remove(idx);
                    changes.removed.push(node);
                }
            }
            // Nodes that left the host in this batch are only reported as removed.
            let departed = |node: &&NodeId| mutations.removed.contains(node);
            for &node in mutations.attribute_changed.iter().filter(|n| !departed(n)) {
                classify(filter, &mut current, &mut changes, node, |c| {
                    &mut c.attribute_changed
                });
            }
            for &node in mutations.content_changed.iter().filter(|n| !departed(n)) {
                classify(filter, &mut current, &mut changes, node, |c| {
                    &mut c.content_changed
                });
            }
            for &node in mutations.added.iter().filter(|&&n| filter(n)) {
                if !current.contains(&node) {
                    current.push(node);
                    changes.added.push(node);
                }
            }
        }

        self.publish(&changes);
        changes
    }

    pub(crate) fn attach(&self, sink: Weak<dyn ChangeSink>) {
        *self.inner.sink.borrow_mut() = Some(sink);
    }

    fn publish(&self, changes: &ChildChanges) {
        if changes.is_empty() {
            return;
        }
        debug!(
            collection = %self.inner.name,
            added = changes.added.len(),
            removed = changes.removed.len(),
            "child collection changed"
        );

        let sink = self.inner.sink.borrow().as_ref().and_then(Weak::upgrade);
        let Some(sink) = sink else {
            return;
        };

        let wants_update = {
            let current = self.inner.current.borrow();
            (self.inner.policy)(&current, changes)
        };
        if wants_update {
            sink.request_update();
        }
        sink.changed(Change::Children {
            name: self.inner.name.clone(),
            changes: changes.clone(),
        });
    }
}

/// Sort a changed child into additions, removals, or the given bucket.
fn classify(
    filter: &Filter,
    current: &mut Vec<NodeId>,
    changes: &mut ChildChanges,
    node: NodeId,
    bucket: impl FnOnce(&mut ChildChanges) -> &mut Vec<NodeId>,
) {
    let idx = current.iter().position(|&n| n == node);
    match (filter(node), idx) {
        (true, None) => {
            current.push(node);
            changes.added.push(node);
        }
        (true, Some(_)) => bucket(changes).push(node),
        (false, Some(idx)) => {
            current.remove(idx);
            changes.removed.push(node);
        }
        (false, None) => {}
    }
}

impl Clone for ChildCollection {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for ChildCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCollection")
            .field("name", &self.inner.name)
            .field("current", &*self.inner.current.borrow())
            .finish()
    }
}
