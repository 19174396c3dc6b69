//! Change Notifications
//!
//! A notification is raised synchronously at the moment an input changes
//! and consumed immediately by dependency matching and lifecycle listeners.
//! Nothing is queued.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::children::ChildChanges;

/// Category of a named input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Attribute,
    State,
    Children,
}

/// A named input changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Attribute {
        name: String,
        previous: Value,
        current: Value,
    },
    State {
        name: String,
        previous: Value,
        current: Value,
    },
    Children {
        name: String,
        changes: ChildChanges,
    },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Attribute { .. } => ChangeKind::Attribute,
            Self::State { .. } => ChangeKind::State,
            Self::Children { .. } => ChangeKind::Children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Attribute { name, .. } | Self::State { name, .. } | Self::Children { name, .. } => name,
        }
    }
}

/// Receiver of notifications raised by inputs.
pub trait ChangeSink {
    /// Deliver a notification.
    fn changed(&self, change: Change);

    /// Ask for an update pass.
    fn request_update(&self);

    /// Mirror an attribute written by the component itself back into the
    /// output host. `None` removes it.
    fn write_attribute(&self, name: &str, value: Option<&str>);
}

/// Serialize an input value for a notification or dependency accessor.
pub(crate) fn snapshot<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|err| {
        warn!(error = %err, "input value could not be serialized");
        Value::Null
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_and_name() {
        let change = Change::State {
            name: "count".to_string(),
            previous: json!(1),
            current: json!(2),
        };
        assert_eq!(change.kind(), ChangeKind::State);
        assert_eq!(change.name(), "count");

        let change = Change::Children {
            name: "items".to_string(),
            changes: ChildChanges::default(),
        };
        assert_eq!(change.kind(), ChangeKind::Children);
    }

    #[test]
    fn snapshot_serializes() {
        assert_eq!(snapshot(&Some(3.5)), json!(3.5));
        assert_eq!(snapshot(&Option::<String>::None), Value::Null);
    }
}
