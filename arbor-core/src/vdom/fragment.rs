//! Fragment expansion.

use super::node::VNode;

/// Flatten fragments into the positional child sequence the reconciler
/// walks. Fragments nest, so expansion is recursive; the retained tree never
/// sees a fragment.
pub fn expand_fragments(children: &[VNode]) -> Vec<&VNode> {
    let mut expanded = Vec::with_capacity(children.len());
    push_expanded(children, &mut expanded);
    expanded
}

fn push_expanded<'a>(children: &'a [VNode], out: &mut Vec<&'a VNode>) {
    for child in children {
        match child {
            VNode::Element(element) if element.is_fragment() => {
                push_expanded(&element.children, out);
            }
            other => out.push(other),
        }
    }
}
