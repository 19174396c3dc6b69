//! Output Host
//!
//! The host owns the live output tree. The reconciler never touches output
//! nodes directly; it issues primitives through the [`Host`] trait:
//!
//! - node creation (element or text)
//! - append, replace and remove of children
//! - attribute set/remove and live property set
//! - event listener install/uninstall
//!
//! Hosts are expected to be synchronous and order-preserving. Writing the
//! same value twice must be harmless, although the reconciler avoids it.
//!
//! [`MemoryHost`] is an arena-backed implementation that records every
//! mutating operation, which makes it the natural test double.

mod node;
mod memory;

pub use node::{NodeId, NodeKind};
pub use memory::{HostOp, MemoryHost};

use crate::vdom::EventHandler;

/// Primitives the reconciler and the change-tracking layer need from the
/// output tree.
pub trait Host {
    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Replace the content of a text node.
    fn set_text(&mut self, node: NodeId, text: &str);

    /// Append `child` as the last child of `parent`.
    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Put `new` in the position of `old` under `parent`, detaching `old`.
    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId);

    /// Detach `child` from `parent`.
    fn remove_child(&mut self, parent: NodeId, child: NodeId);

    /// Write a serialized attribute.
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    /// Remove an attribute.
    fn remove_attribute(&mut self, node: NodeId, name: &str);

    /// Write a live property.
    fn set_property(&mut self, node: NodeId, name: &str, value: &str);

    /// Install an event listener.
    fn add_listener(&mut self, node: NodeId, event: &str, handler: &EventHandler);

    /// Uninstall a previously installed event listener.
    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &EventHandler);

    /// Whether the node exposes a live property named `name`.
    fn has_property(&self, node: NodeId, name: &str) -> bool;

    /// Read a serialized attribute.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Children of a node, in order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;
}
