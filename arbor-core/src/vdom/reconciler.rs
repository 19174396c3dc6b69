//! Reconciler
//!
//! Entry point for patching an output container to match a list of
//! declarative children. The container itself is owned by the caller; the
//! reconciler only manages what is inside it.

use tracing::{debug, instrument};

use super::node::VNode;
use super::retained::{Retained, RetainedElement};
use crate::config::Config;
use crate::host::{Host, NodeId};

/// Retained tree rooted at a caller-owned container node.
#[derive(Debug)]
pub struct Reconciler {
    config: Config,
    root: RetainedElement,
    passes: u64,
}

impl Reconciler {
    /// Manage the children of `container`, an element with tag `tag`.
    pub fn new(container: NodeId, tag: &str, config: Config) -> Self {
        Self {
            config,
            root: RetainedElement::adopt(tag, container),
            passes: 0,
        }
    }

    /// Patch the container's children to match `children`.
    #[instrument(skip_all, fields(container = %self.root.node()))]
    pub fn render<H>(&mut self, host: &mut H, children: &[VNode])
    where
        H: Host + ?Sized,
    {
        self.root.update_children(host, children, &self.config);
        self.passes += 1;
        debug!(passes = self.passes, children = self.root.children().len(), "reconciled");
    }

    /// Remove every rendered child, clearing reference slots.
    pub fn clear<H>(&mut self, host: &mut H)
    where
        H: Host + ?Sized,
    {
        self.root.update_children(host, &[], &self.config);
    }

    pub fn container(&self) -> NodeId {
        self.root.node()
    }

    /// Top-level retained children.
    pub fn children(&self) -> &[Retained] {
        self.root.children()
    }

    /// Number of completed render calls.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
