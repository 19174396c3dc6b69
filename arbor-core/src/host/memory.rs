//! In-memory output host.
//!
//! Nodes live in an arena. Detached nodes simply have no parent, which
//! mirrors how a garbage-collected document behaves, and stay allocated
//! until [`MemoryHost::free`] releases them. Every
//! mutating primitive is appended to an operation log so tests can assert
//! exactly which writes a reconciliation performed.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::warn;

use super::{Host, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::vdom::{Event, EventHandler};

/// A mutating primitive issued against a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetText { node: NodeId, text: String },
    AppendChild { parent: NodeId, child: NodeId },
    ReplaceChild { parent: NodeId, new: NodeId, old: NodeId },
    RemoveChild { parent: NodeId, child: NodeId },
    SetAttribute { node: NodeId, name: String, value: String },
    RemoveAttribute { node: NodeId, name: String },
    SetProperty { node: NodeId, name: String, value: String },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
}

impl HostOp {
    /// Whether the operation writes to an attribute, property or listener
    /// (as opposed to changing the tree shape).
    pub fn is_attribute_write(&self) -> bool {
        matches!(
            self,
            Self::SetAttribute { .. }
                | Self::RemoveAttribute { .. }
                | Self::SetProperty { .. }
                | Self::AddListener { .. }
                | Self::RemoveListener { .. }
        )
    }
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    text: String,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, String>,
    listeners: SmallVec<[(String, EventHandler); 2]>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl MemoryNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            text: String::new(),
            attributes: IndexMap::new(),
            properties: IndexMap::new(),
            listeners: SmallVec::new(),
            children: Vec::new(),
            parent: None,
        }
    }
}

/// Arena-backed output tree.
#[derive(Debug)]
pub struct MemoryHost {
    /// Freed slots stay as `None` so handles are never reused.
    nodes: Vec<Option<MemoryNode>>,
    ops: Vec<HostOp>,
    /// Live properties exposed per element tag.
    properties_by_tag: IndexMap<String, SmallVec<[String; 2]>>,
}

impl MemoryHost {
    /// Create an empty host. Form controls (`input`, `textarea`, `select`)
    /// expose a live `value` property.
    pub fn new() -> Self {
        let mut properties_by_tag: IndexMap<String, SmallVec<[String; 2]>> = IndexMap::new();
        for tag in ["input", "textarea", "select"] {
            properties_by_tag.insert(tag.to_string(), SmallVec::from_iter(["value".to_string()]));
        }

        Self {
            nodes: Vec::new(),
            ops: Vec::new(),
            properties_by_tag,
        }
    }

    /// Declare that elements with `tag` expose a live property `name`.
    pub fn expose_property(&mut self, tag: &str, name: &str) {
        self.properties_by_tag
            .entry(tag.to_string())
            .or_default()
            .push(name.to_string());
    }

    /// Operations recorded since creation or the last [`MemoryHost::take_ops`].
    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    /// Drain the operation log.
    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of live nodes. Detached nodes count until they are passed to
    /// [`MemoryHost::free`].
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Release a detached node and its whole subtree. Returns how many nodes
    /// were freed; attached or unknown nodes free nothing.
    pub fn free(&mut self, node: NodeId) -> usize {
        match self.get(node) {
            Some(memory_node) if memory_node.parent.is_none() => {}
            Some(_) => {
                warn!(%node, "free: node is still attached");
                return 0;
            }
            None => return 0,
        }

        let mut pending = vec![node];
        let mut freed = 0;
        while let Some(id) = pending.pop() {
            let released = self
                .nodes
                .get_mut(id.raw() as usize)
                .and_then(Option::take);
            if let Some(memory_node) = released {
                pending.extend(memory_node.children);
                freed += 1;
            }
        }
        freed
    }

    /// Tag of an element node.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Element(tag) => Some(tag.as_str()),
            NodeKind::Text => None,
        }
    }

    /// Content of a text node.
    pub fn text(&self, node: NodeId) -> Option<&str> {
        let node = self.get(node)?;
        match node.kind {
            NodeKind::Text => Some(node.text.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    /// Value of a live property.
    pub fn property(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)?.properties.get(name).map(String::as_str)
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }

    /// Number of listeners installed for `event`.
    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.get(node)
            .map(|n| n.listeners.iter().filter(|(e, _)| e == event).count())
            .unwrap_or(0)
    }

    /// Invoke every listener installed on `node` for `event`.
    ///
    /// Handlers are cloned out before being called, but they run while the
    /// caller holds this host, so they must not mutate it.
    pub fn dispatch_event(&self, node: NodeId, event: &str) -> usize {
        let handlers: Vec<EventHandler> = self
            .get(node)
            .map(|n| {
                n.listeners
                    .iter()
                    .filter(|(e, _)| e == event)
                    .map(|(_, h)| h.clone())
                    .collect()
            })
            .unwrap_or_default();

        let payload = Event {
            name: event.to_string(),
            target: node,
        };
        for handler in &handlers {
            handler.call(&payload);
        }
        handlers.len()
    }

    /// Write an attribute on behalf of an external producer, bypassing the
    /// operation log.
    pub fn write_attribute(&mut self, node: NodeId, name: &str, value: Option<&str>) {
        if let Some(n) = self.get_mut(node) {
            match value {
                Some(value) => {
                    n.attributes.insert(name.to_string(), value.to_string());
                }
                None => {
                    n.attributes.shift_remove(name);
                }
            }
        }
    }

    /// Serialize a subtree as HTML-like markup. Properties and listeners are
    /// not part of the output.
    pub fn to_markup(&self, node: NodeId) -> Result<String> {
        let mut out = String::new();
        self.write_markup(node, &mut out)?;
        Ok(out)
    }

    fn write_markup(&self, id: NodeId, out: &mut String) -> Result<()> {
        let node = self.get(id).ok_or(Error::UnknownNode(id))?;
        match &node.kind {
            NodeKind::Text => out.push_str(&node.text),
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &node.attributes {
                    out.push_str(&format!(" {}=\"{}\"", name, value));
                }
                out.push('>');
                for child in &node.children {
                    self.write_markup(*child, out)?;
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
        Ok(())
    }

    fn get(&self, node: NodeId) -> Option<&MemoryNode> {
        self.nodes.get(node.raw() as usize)?.as_ref()
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut MemoryNode> {
        let found = self
            .nodes
            .get_mut(node.raw() as usize)
            .and_then(Option::as_mut);
        if found.is_none() {
            warn!(%node, "host primitive issued against an unknown node");
        }
        found
    }

    fn insert(&mut self, node: MemoryNode) -> NodeId {
        let id = NodeId::from(self.nodes.len() as u64);
        self.nodes.push(Some(node));
        id
    }

    fn detach(&mut self, parent: NodeId, child: NodeId) -> Option<usize> {
        let position = {
            let parent_node = self.get_mut(parent)?;
            let position = parent_node.children.iter().position(|c| *c == child)?;
            parent_node.children.remove(position);
            position
        };
        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = None;
        }
        Some(position)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str) -> NodeId {
        let node = self.insert(MemoryNode::new(NodeKind::Element(tag.to_string())));
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let mut memory_node = MemoryNode::new(NodeKind::Text);
        memory_node.text = text.to_string();
        let node = self.insert(memory_node);
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(n) = self.get_mut(node) {
            n.text = text.to_string();
            self.ops.push(HostOp::SetText {
                node,
                text: text.to_string(),
            });
        }
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(previous) = self.parent(child) {
            self.detach(previous, child);
        }
        let Some(p) = self.get_mut(parent) else {
            return;
        };
        p.children.push(child);
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        self.ops.push(HostOp::AppendChild { parent, child });
    }

    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) {
        let Some(position) = self.detach(parent, old) else {
            warn!(%parent, %old, "replace_child: node is not a child of parent");
            return;
        };
        if let Some(previous) = self.parent(new) {
            self.detach(previous, new);
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.insert(position, new);
        }
        if let Some(n) = self.get_mut(new) {
            n.parent = Some(parent);
        }
        self.ops.push(HostOp::ReplaceChild { parent, new, old });
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if self.detach(parent, child).is_some() {
            self.ops.push(HostOp::RemoveChild { parent, child });
        } else {
            warn!(%parent, %child, "remove_child: node is not a child of parent");
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.get_mut(node) {
            n.attributes.insert(name.to_string(), value.to_string());
            self.ops.push(HostOp::SetAttribute {
                node,
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) {
        if let Some(n) = self.get_mut(node) {
            n.attributes.shift_remove(name);
            self.ops.push(HostOp::RemoveAttribute {
                node,
                name: name.to_string(),
            });
        }
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(n) = self.get_mut(node) {
            n.properties.insert(name.to_string(), value.to_string());
            self.ops.push(HostOp::SetProperty {
                node,
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    fn add_listener(&mut self, node: NodeId, event: &str, handler: &EventHandler) {
        if let Some(n) = self.get_mut(node) {
            n.listeners.push((event.to_string(), handler.clone()));
            self.ops.push(HostOp::AddListener {
                node,
                event: event.to_string(),
            });
        }
    }

    fn remove_listener(&mut self, node: NodeId, event: &str, handler: &EventHandler) {
        if let Some(n) = self.get_mut(node) {
            n.listeners.retain(|(e, h)| !(e == event && h == handler));
            self.ops.push(HostOp::RemoveListener {
                node,
                event: event.to_string(),
            });
        }
    }

    fn has_property(&self, node: NodeId, name: &str) -> bool {
        let Some(tag) = self.tag(node) else {
            return false;
        };
        self.properties_by_tag
            .get(tag)
            .map(|props| props.iter().any(|p| p == name))
            .unwrap_or(false)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.get(node)?.attributes.get(name).cloned()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node).map(|n| n.children.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn builds_and_serializes_a_tree() {
        let mut host = MemoryHost::new();
        let div = host.create_element("div");
        let text = host.create_text("hi");
        host.append_child(div, text);
        host.set_attribute(div, "id", "a");

        assert_eq!(host.to_markup(div).unwrap(), r#"<div id="a">hi</div>"#);
        assert_eq!(host.parent(text), Some(div));
    }

    #[test]
    fn replace_keeps_position() {
        let mut host = MemoryHost::new();
        let root = host.create_element("ul");
        let a = host.create_element("a");
        let b = host.create_element("b");
        let c = host.create_element("c");
        host.append_child(root, a);
        host.append_child(root, b);

        host.replace_child(root, c, a);

        assert_eq!(host.children(root), vec![c, b]);
        assert_eq!(host.parent(a), None);
        assert_eq!(host.parent(c), Some(root));
    }

    #[test]
    fn remove_detaches() {
        let mut host = MemoryHost::new();
        let root = host.create_element("div");
        let child = host.create_text("x");
        host.append_child(root, child);
        host.remove_child(root, child);

        assert!(host.children(root).is_empty());
        assert_eq!(host.parent(child), None);
    }

    #[test]
    fn form_controls_expose_value() {
        let mut host = MemoryHost::new();
        let input = host.create_element("input");
        let div = host.create_element("div");

        assert!(host.has_property(input, "value"));
        assert!(!host.has_property(div, "value"));

        host.expose_property("div", "value");
        assert!(host.has_property(div, "value"));
    }

    #[test]
    fn dispatch_invokes_listeners() {
        let mut host = MemoryHost::new();
        let button = host.create_element("button");
        let clicks = Rc::new(Cell::new(0));
        let clicks_clone = clicks.clone();
        let handler = EventHandler::new(move |event: &Event| {
            assert_eq!(event.name, "click");
            clicks_clone.set(clicks_clone.get() + 1);
        });

        host.add_listener(button, "click", &handler);
        assert_eq!(host.dispatch_event(button, "click"), 1);
        assert_eq!(clicks.get(), 1);

        host.remove_listener(button, "click", &handler);
        assert_eq!(host.dispatch_event(button, "click"), 0);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn unknown_node_markup_is_an_error() {
        let host = MemoryHost::new();
        let err = host.to_markup(NodeId::from(42)).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
    }

    #[test]
    fn free_releases_detached_subtrees_only() {
        let mut host = MemoryHost::new();
        let root = host.create_element("ul");
        let item = host.create_element("li");
        let text = host.create_text("x");
        host.append_child(item, text);
        host.append_child(root, item);
        assert_eq!(host.node_count(), 3);

        assert_eq!(host.free(item), 0);
        assert_eq!(host.node_count(), 3);

        host.remove_child(root, item);
        assert_eq!(host.free(item), 2);
        assert_eq!(host.node_count(), 1);
        assert_eq!(host.parent(text), None);
        assert!(host.to_markup(item).is_err());

        let next = host.create_element("li");
        assert_ne!(next, item);
        assert_eq!(host.free(item), 0);
    }
}
