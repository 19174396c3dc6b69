//! Reconciler
//!
//! Turns a freshly produced declarative tree into the minimal set of
//! mutations against a persistent output tree.
//!
//! # Pieces
//!
//! - [`VNode`]/[`VElement`]: the immutable description produced each pass.
//! - [`AttributeSetter`]: memoized per-node, per-attribute writer that skips
//!   redundant host writes.
//! - [`Retained`]/[`RetainedElement`]: the stateful counterpart of each
//!   description position, owning one live output node.
//! - [`Reconciler`]: the retained tree rooted at a caller-owned container.
//!
//! # Algorithm
//!
//! Attributes: every entry in the description goes through its setter; any
//! name applied last pass but missing now is cleared through its setter
//! exactly once. The reserved reference attribute binds a [`NodeRef`]
//! instead of being written.
//!
//! Children: fragments are flattened, the retained list is truncated if it
//! is longer, then each position is created, updated in place, or replaced.
//! Matching is positional; there are no keys.

mod node;
mod fragment;
mod setter;
mod retained;
mod reconciler;

pub use node::{AttrValue, Event, EventHandler, NodeRef, VElement, VNode};
pub use fragment::expand_fragments;
pub use setter::{AttributeSetter, SetterKind};
pub use retained::{Retained, RetainedElement, RetainedText};
pub use reconciler::Reconciler;
