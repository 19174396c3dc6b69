//! Declarative Tree
//!
//! The description a component produces on every pass. It is immutable once
//! built and cheap to throw away; the reconciler compares it against the
//! retained tree and only carries the differences into the output host.
//!
//! The JSON form is `"text"` for a leaf and
//! `{"element": "div", "attributes": [["id", "a"]], "children": [...]}` for a
//! composite node. An element with an empty tag is a fragment.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::host::NodeId;

/// A node of the declarative tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VNode {
    /// A text leaf.
    Text(String),

    /// A composite node (or a fragment when the tag is empty).
    Element(VElement),
}

impl VNode {
    /// Create a text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a fragment whose children splice into the parent.
    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        Self::Element(VElement {
            tag: String::new(),
            attributes: Vec::new(),
            children: children.into_iter().collect(),
        })
    }

    /// Whether this node is a fragment.
    pub fn is_fragment(&self) -> bool {
        matches!(self, Self::Element(element) if element.is_fragment())
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<VElement> for VNode {
    fn from(element: VElement) -> Self {
        Self::Element(element)
    }
}

/// A composite node: tag, ordered attribute entries and ordered children.
///
/// An attribute entry with no value asks for the attribute to be removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VElement {
    #[serde(rename = "element")]
    pub tag: String,

    #[serde(default)]
    pub attributes: Vec<(String, Option<AttrValue>)>,

    #[serde(default)]
    pub children: Vec<VNode>,
}

impl VElement {
    /// Create an element with no attributes and no children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute entry.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.push((name.into(), Some(value.into())));
        self
    }

    /// Add an attribute entry that explicitly carries no value.
    pub fn unset(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), None));
        self
    }

    /// Add a child.
    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Add several children.
    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<VNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// Whether this element is a fragment.
    pub fn is_fragment(&self) -> bool {
        self.tag.is_empty()
    }
}

/// Value of an attribute entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A string written verbatim.
    Text(String),

    /// `false` clears the attribute, `true` writes `"true"`.
    Flag(bool),

    /// An event handler, only meaningful for event attributes.
    #[serde(skip)]
    Handler(EventHandler),

    /// A node reference, only meaningful for the reserved reference attribute.
    #[serde(skip)]
    Ref(NodeRef),
}

impl AttrValue {
    /// Serialized form written to the output host. `None` means the
    /// attribute should be removed.
    pub fn serialized(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Flag(true) => Some("true"),
            Self::Flag(false) | Self::Handler(_) | Self::Ref(_) => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<EventHandler> for AttrValue {
    fn from(handler: EventHandler) -> Self {
        Self::Handler(handler)
    }
}

impl From<NodeRef> for AttrValue {
    fn from(node_ref: NodeRef) -> Self {
        Self::Ref(node_ref)
    }
}

/// Payload delivered to event handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
}

/// A shared event handler. Two handlers are equal iff they are the same
/// allocation, so re-rendering with a clone of the same handler is a no-op.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.0) as *const () == Rc::as_ptr(&other.0) as *const ()
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Slot mirroring the identity of a live output node to outside holders.
///
/// The reconciler fills it when the bound node is created and clears it
/// when that node is destroyed, unless the slot was rebound to another node
/// in the meantime.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<Cell<Option<NodeId>>>);

impl NodeRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// The bound node, if any.
    pub fn get(&self) -> Option<NodeId> {
        self.0.get()
    }

    pub(crate) fn set(&self, node: NodeId) {
        self.0.set(Some(node));
    }

    pub(crate) fn clear(&self) {
        self.0.set(None);
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeRef").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_entries_in_order() {
        let node = VElement::new("div")
            .attr("id", "a")
            .attr("hidden", false)
            .unset("title")
            .child("hi");

        assert_eq!(node.attributes.len(), 3);
        assert_eq!(node.attributes[0], ("id".to_string(), Some(AttrValue::from("a"))));
        assert_eq!(node.attributes[2], ("title".to_string(), None));
        assert_eq!(node.children, vec![VNode::text("hi")]);
    }

    #[test]
    fn parses_json_form() {
        let json = r#"{
            "element": "div",
            "attributes": [["id", "a"], ["title", null], ["checked", true]],
            "children": ["hi", {"element": "", "children": ["x"]}]
        }"#;
        let node: VNode = serde_json::from_str(json).unwrap();

        let VNode::Element(element) = node else {
            panic!("expected an element");
        };
        assert_eq!(element.tag, "div");
        assert_eq!(element.attributes[1].1, None);
        assert_eq!(element.attributes[2].1, Some(AttrValue::Flag(true)));
        assert!(element.children[1].is_fragment());
    }

    #[test]
    fn serialized_values() {
        assert_eq!(AttrValue::from("x").serialized(), Some("x"));
        assert_eq!(AttrValue::Flag(true).serialized(), Some("true"));
        assert_eq!(AttrValue::Flag(false).serialized(), None);
    }

    #[test]
    fn handler_equality_is_identity() {
        let a = EventHandler::new(|_| {});
        let b = EventHandler::new(|_| {});
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn node_ref_equality_is_identity() {
        let a = NodeRef::new();
        let b = NodeRef::new();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        a.set(NodeId::from(3));
        assert_eq!(a.clone().get(), Some(NodeId::from(3)));
        a.clear();
        assert_eq!(a.get(), None);
    }
}
