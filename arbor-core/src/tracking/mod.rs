//! Change Tracking
//!
//! The named inputs a component reads during render:
//!
//! - [`Attribute`]: typed mirror of a host attribute
//! - [`State`]: component-local value
//! - [`ChildCollection`]: filtered set of host children
//!
//! Every input reports through a [`ChangeSink`] the moment it changes.
//! The component owns the sink and fans notifications out to effect
//! dependencies and lifecycle listeners.

mod attribute;
mod change;
mod children;
mod state;
pub mod parsers;

pub use attribute::{Attribute, AttributeValue};
pub(crate) use attribute::ObservedAttribute;
pub(crate) use change::snapshot;
pub use change::{Change, ChangeKind, ChangeSink};
pub use children::{any_change, ChildChanges, ChildCollection, ChildMutations};
pub use state::State;
