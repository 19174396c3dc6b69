//! Retained Nodes
//!
//! The persistent counterpart of one declarative-tree position. Each retained
//! node owns exactly one live output node (by handle) and its own children,
//! so the retained tree and the output tree always have the same shape.
//!
//! # Matching
//!
//! Children are matched by position only. Two nodes at the same index are
//! the same logical node iff they are both text, or both elements with the
//! same tag. Anything else is a replacement: the new node is built detached,
//! spliced into the old node's position, and the old subtree is destroyed.
//! Reordering therefore costs one replacement per moved position.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::fragment::expand_fragments;
use super::node::{AttrValue, NodeRef, VElement, VNode};
use super::setter::AttributeSetter;
use crate::config::Config;
use crate::host::{Host, NodeId};

/// A retained text or element node.
#[derive(Debug)]
pub enum Retained {
    Text(RetainedText),
    Element(RetainedElement),
}

impl Retained {
    /// Build a retained node (and its live output subtree) for `description`.
    /// The output node is created detached.
    pub fn create<H>(host: &mut H, description: &VNode, config: &Config) -> Self
    where
        H: Host + ?Sized,
    {
        match description {
            VNode::Text(text) => Self::Text(RetainedText::create(host, text)),
            VNode::Element(element) => Self::Element(RetainedElement::create(host, element, config)),
        }
    }

    /// Handle of the live output node.
    pub fn node(&self) -> NodeId {
        match self {
            Self::Text(text) => text.node,
            Self::Element(element) => element.node,
        }
    }

    /// Whether `description` can be applied to this node in place.
    pub fn matches(&self, description: &VNode) -> bool {
        match (self, description) {
            (Self::Text(_), VNode::Text(_)) => true,
            (Self::Element(element), VNode::Element(other)) => element.tag == other.tag,
            _ => false,
        }
    }

    /// Apply a matching description in place. Callers check
    /// [`Retained::matches`] first; a mismatched description is ignored.
    pub fn update<H>(&mut self, host: &mut H, description: &VNode, config: &Config)
    where
        H: Host + ?Sized,
    {
        match (self, description) {
            (Self::Text(retained), VNode::Text(text)) => {
                retained.update(host, text);
            }
            (Self::Element(retained), VNode::Element(element)) if retained.tag == element.tag => {
                retained.update(host, element, config);
            }
            (retained, _) => {
                warn!(node = %retained.node(), "update called with a mismatched description");
            }
        }
    }

    /// Release everything this subtree exposes to outside holders.
    pub fn destroy(&mut self) {
        if let Self::Element(element) = self {
            element.destroy();
        }
    }

    pub fn as_element(&self) -> Option<&RetainedElement> {
        match self {
            Self::Element(element) => Some(element),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&RetainedText> {
        match self {
            Self::Text(text) => Some(text),
            Self::Element(_) => None,
        }
    }
}

/// Retained text leaf.
#[derive(Debug)]
pub struct RetainedText {
    node: NodeId,
    text: String,
}

impl RetainedText {
    fn create<H>(host: &mut H, text: &str) -> Self
    where
        H: Host + ?Sized,
    {
        let node = host.create_text(text);
        trace!(%node, "created text node");
        Self {
            node,
            text: text.to_string(),
        }
    }

    /// Replace the text if it differs. Returns whether the host was touched.
    pub fn update<H>(&mut self, host: &mut H, text: &str) -> bool
    where
        H: Host + ?Sized,
    {
        if self.text == text {
            return false;
        }
        host.set_text(self.node, text);
        self.text = text.to_string();
        true
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Retained element with its setter cache and children.
#[derive(Debug)]
pub struct RetainedElement {
    tag: String,
    node: NodeId,
    /// Setters keyed by attribute name, created on first use.
    setters: IndexMap<String, AttributeSetter>,
    /// Names applied during the last pass, in description order.
    applied: SmallVec<[String; 8]>,
    children: Vec<Retained>,
    node_ref: Option<NodeRef>,
}

impl RetainedElement {
    /// Create a detached element for `description` and fill it.
    pub fn create<H>(host: &mut H, description: &VElement, config: &Config) -> Self
    where
        H: Host + ?Sized,
    {
        let node = host.create_element(&description.tag);
        trace!(%node, tag = %description.tag, "created element");
        let mut element = Self::adopt(&description.tag, node);
        element.update(host, description, config);
        element
    }

    /// Take over an existing, empty output element. Used for containers the
    /// caller created itself.
    pub fn adopt(tag: &str, node: NodeId) -> Self {
        Self {
            tag: tag.to_string(),
            node,
            setters: IndexMap::new(),
            applied: SmallVec::new(),
            children: Vec::new(),
            node_ref: None,
        }
    }

    /// Make the live element match `description`. The tag is not compared;
    /// callers route mismatches to replacement.
    pub fn update<H>(&mut self, host: &mut H, description: &VElement, config: &Config)
    where
        H: Host + ?Sized,
    {
        self.update_attributes(host, &description.attributes, config);
        self.update_children(host, &description.children, config);
    }

    /// Apply attribute entries, then remove every name applied last pass
    /// but missing from this one.
    pub fn update_attributes<H>(
        &mut self,
        host: &mut H,
        attributes: &[(String, Option<AttrValue>)],
        config: &Config,
    ) where
        H: Host + ?Sized,
    {
        let node = self.node;
        let mut applied: SmallVec<[String; 8]> = SmallVec::new();
        let mut bound_ref = None;

        for (name, value) in attributes {
            if *name == config.ref_attribute {
                match value {
                    Some(AttrValue::Ref(node_ref)) => bound_ref = Some(node_ref.clone()),
                    Some(other) => warn!(%node, value = ?other, "reference attribute given a non-reference value"),
                    None => {}
                }
                continue;
            }

            let setter = self
                .setters
                .entry(name.clone())
                .or_insert_with(|| AttributeSetter::new(host, node, name, config));
            setter.apply(host, node, value.as_ref());
            applied.push(name.clone());
        }

        for name in &self.applied {
            if applied.contains(name) {
                continue;
            }
            if let Some(setter) = self.setters.get_mut(name) {
                setter.apply(host, node, None);
            }
        }
        self.applied = applied;

        if self.node_ref != bound_ref {
            if let Some(previous) = self.node_ref.take() {
                release(&previous, node);
            }
        }
        if let Some(node_ref) = &bound_ref {
            node_ref.set(node);
        }
        self.node_ref = bound_ref;
    }

    /// Positional child diff against `children` (fragments expanded first).
    pub fn update_children<H>(&mut self, host: &mut H, children: &[VNode], config: &Config)
    where
        H: Host + ?Sized,
    {
        let node = self.node;
        let flat = expand_fragments(children);

        if self.children.len() > flat.len() {
            for mut stale in self.children.drain(flat.len()..) {
                trace!(parent = %node, child = %stale.node(), "removing child");
                host.remove_child(node, stale.node());
                stale.destroy();
            }
        }

        for (index, description) in flat.into_iter().enumerate() {
            match self.children.get_mut(index) {
                None => {
                    let child = Retained::create(host, description, config);
                    host.append_child(node, child.node());
                    self.children.push(child);
                }
                Some(existing) if existing.matches(description) => {
                    existing.update(host, description, config);
                }
                Some(existing) => {
                    let fresh = Retained::create(host, description, config);
                    trace!(parent = %node, old = %existing.node(), new = %fresh.node(), "replacing child");
                    host.replace_child(node, fresh.node(), existing.node());
                    let mut discarded = std::mem::replace(existing, fresh);
                    discarded.destroy();
                }
            }
        }
    }

    /// Clear reference slots in this subtree. The caller detaches the output
    /// node; descendants go with it.
    pub fn destroy(&mut self) {
        if let Some(node_ref) = self.node_ref.take() {
            release(&node_ref, self.node);
        }
        for child in &mut self.children {
            child.destroy();
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn children(&self) -> &[Retained] {
        &self.children
    }

    /// Attribute names applied in the last pass.
    pub fn applied(&self) -> &[String] {
        &self.applied
    }

    /// Cached setter for `name`, if one was ever created.
    pub fn setter(&self, name: &str) -> Option<&AttributeSetter> {
        self.setters.get(name)
    }

    pub fn node_ref(&self) -> Option<&NodeRef> {
        self.node_ref.as_ref()
    }
}

/// Clear `node_ref` if it still points at `node`. A slot rebound to another
/// node earlier in the same pass keeps its new target.
fn release(node_ref: &NodeRef, node: NodeId) {
    if node_ref.get() == Some(node) {
        node_ref.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOp, MemoryHost};

    fn mount(host: &mut MemoryHost, description: &VElement) -> RetainedElement {
        let element = RetainedElement::create(host, description, &Config::default());
        host.take_ops();
        element
    }

    #[test]
    fn create_builds_the_whole_subtree() {
        let mut host = MemoryHost::new();
        let description = VElement::new("ul")
            .attr("class", "list")
            .child(VElement::new("li").child("one"))
            .child(VElement::new("li").child("two"));

        let element = RetainedElement::create(&mut host, &description, &Config::default());

        assert_eq!(
            host.to_markup(element.node()).unwrap(),
            r#"<ul class="list"><li>one</li><li>two</li></ul>"#
        );
        assert_eq!(element.children().len(), 2);
        assert_eq!(element.applied(), ["class".to_string()]);
    }

    #[test]
    fn identical_update_touches_nothing() {
        let mut host = MemoryHost::new();
        let description = VElement::new("div")
            .attr("id", "a")
            .attr("title", "t")
            .child(VElement::new("span").attr("class", "x").child("hi"));
        let mut element = mount(&mut host, &description);

        element.update(&mut host, &description, &Config::default());

        assert!(host.ops().is_empty());
    }

    #[test]
    fn dropped_attributes_are_removed_once() {
        let mut host = MemoryHost::new();
        let mut element = mount(
            &mut host,
            &VElement::new("div").attr("id", "a").attr("title", "t").attr("lang", "en"),
        );
        let node = element.node();

        element.update(&mut host, &VElement::new("div").attr("title", "t"), &Config::default());

        let removals: Vec<_> = host
            .ops()
            .iter()
            .filter(|op| matches!(op, HostOp::RemoveAttribute { .. }))
            .collect();
        assert_eq!(removals.len(), 2);
        assert_eq!(host.attribute(node, "title").as_deref(), Some("t"));
        assert_eq!(element.applied(), ["title".to_string()]);

        host.take_ops();
        element.update(&mut host, &VElement::new("div").attr("title", "t"), &Config::default());
        assert!(host.ops().is_empty());
    }

    #[test]
    fn setter_survives_removal_and_readdition() {
        let mut host = MemoryHost::new();
        let mut element = mount(&mut host, &VElement::new("div").attr("id", "a"));

        element.update(&mut host, &VElement::new("div"), &Config::default());
        assert!(element.setter("id").is_some());

        element.update(&mut host, &VElement::new("div").attr("id", "a"), &Config::default());
        assert_eq!(host.attribute(element.node(), "id").as_deref(), Some("a"));
    }

    #[test]
    fn text_updates_in_place() {
        let mut host = MemoryHost::new();
        let mut element = mount(&mut host, &VElement::new("p").child("hi"));
        let text_node = element.children()[0].node();

        element.update(&mut host, &VElement::new("p").child("bye"), &Config::default());

        assert_eq!(element.children()[0].node(), text_node);
        assert_eq!(host.text(text_node), Some("bye"));
        assert_eq!(
            host.take_ops(),
            vec![HostOp::SetText { node: text_node, text: "bye".to_string() }]
        );
    }

    #[test]
    fn kind_mismatch_replaces() {
        let mut host = MemoryHost::new();
        let mut element = mount(&mut host, &VElement::new("p").child("hi"));
        let old = element.children()[0].node();

        element.update(
            &mut host,
            &VElement::new("p").child(VElement::new("b").child("hi")),
            &Config::default(),
        );

        let new = element.children()[0].node();
        assert_ne!(old, new);
        assert_eq!(host.parent(old), None);
        assert_eq!(host.to_markup(element.node()).unwrap(), "<p><b>hi</b></p>");

        element.update(&mut host, &VElement::new("p").child("hi"), &Config::default());
        assert!(element.children()[0].as_text().is_some());
        assert_eq!(host.to_markup(element.node()).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn swap_is_two_replacements() {
        let mut host = MemoryHost::new();
        let mut element = mount(
            &mut host,
            &VElement::new("div").child(VElement::new("a")).child(VElement::new("b")),
        );

        element.update(
            &mut host,
            &VElement::new("div").child(VElement::new("b")).child(VElement::new("a")),
            &Config::default(),
        );

        let replacements = host
            .ops()
            .iter()
            .filter(|op| matches!(op, HostOp::ReplaceChild { .. }))
            .count();
        assert_eq!(replacements, 2);
    }

    #[test]
    fn fragments_flatten_positionally() {
        let mut host = MemoryHost::new();
        let description = VElement::new("div").child(VNode::fragment([
            VNode::text("a"),
            VNode::fragment([VElement::new("b").into()]),
        ]));
        let element = mount(&mut host, &description);

        assert_eq!(element.children().len(), 2);
        assert_eq!(host.to_markup(element.node()).unwrap(), "<div>a<b></b></div>");
    }

    #[test]
    fn reference_slot_follows_node_lifetime() {
        let mut host = MemoryHost::new();
        let input_ref = NodeRef::new();
        let mut element = mount(
            &mut host,
            &VElement::new("form").child(VElement::new("input").attr("ref", input_ref.clone())),
        );
        let input = element.children()[0].node();
        assert_eq!(input_ref.get(), Some(input));
        assert_eq!(host.attribute(input, "ref"), None);

        element.update(&mut host, &VElement::new("form"), &Config::default());
        assert_eq!(input_ref.get(), None);
    }

    #[test]
    fn dropping_reference_attribute_clears_slot() {
        let mut host = MemoryHost::new();
        let node_ref = NodeRef::new();
        let mut element = mount(&mut host, &VElement::new("div").attr("ref", node_ref.clone()));
        assert_eq!(node_ref.get(), Some(element.node()));

        element.update(&mut host, &VElement::new("div"), &Config::default());
        assert_eq!(node_ref.get(), None);
        assert!(element.node_ref().is_none());
    }

    #[test]
    fn reference_follows_replacement_at_same_position() {
        let mut host = MemoryHost::new();
        let slot = NodeRef::new();
        let mut element = mount(
            &mut host,
            &VElement::new("section").child(VElement::new("div").attr("ref", slot.clone())),
        );
        let div = element.children()[0].node();
        assert_eq!(slot.get(), Some(div));

        element.update(
            &mut host,
            &VElement::new("section").child(VElement::new("span").attr("ref", slot.clone())),
            &Config::default(),
        );

        let span = element.children()[0].node();
        assert_ne!(span, div);
        assert_eq!(slot.get(), Some(span));
    }

    #[test]
    fn reference_moved_to_earlier_sibling_survives_destroy() {
        let mut host = MemoryHost::new();
        let slot = NodeRef::new();
        let mut element = mount(
            &mut host,
            &VElement::new("ul")
                .child(VElement::new("a"))
                .child(VElement::new("b").attr("ref", slot.clone())),
        );
        let a = element.children()[0].node();

        element.update(
            &mut host,
            &VElement::new("ul")
                .child(VElement::new("a").attr("ref", slot.clone()))
                .child(VElement::new("c")),
            &Config::default(),
        );
        assert_eq!(slot.get(), Some(a));

        element.update(
            &mut host,
            &VElement::new("ul").child(VElement::new("a").attr("ref", slot.clone())),
            &Config::default(),
        );
        assert_eq!(slot.get(), Some(a));
    }

    #[test]
    fn reference_moved_to_later_sibling_is_kept() {
        let mut host = MemoryHost::new();
        let slot = NodeRef::new();
        let mut element = mount(
            &mut host,
            &VElement::new("ul")
                .child(VElement::new("a").attr("ref", slot.clone()))
                .child(VElement::new("b")),
        );

        element.update(
            &mut host,
            &VElement::new("ul")
                .child(VElement::new("a"))
                .child(VElement::new("b").attr("ref", slot.clone())),
            &Config::default(),
        );

        assert_eq!(slot.get(), Some(element.children()[1].node()));
        assert!(element.children()[0].as_element().unwrap().node_ref().is_none());
    }
}
