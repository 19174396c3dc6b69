//! Attribute Setters
//!
//! One setter per (output node, attribute name). The specialization is
//! picked the first time the name is seen on a node and memoized for the
//! node's lifetime. Every setter remembers the last value it applied and
//! short-circuits when handed the same value again; this is the only place
//! redundant host writes are filtered out.

use tracing::warn;

use super::node::AttrValue;
use crate::config::Config;
use crate::host::{Host, NodeId};

/// How a setter applies its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetterKind {
    /// Binds an event listener for `event`.
    Event { event: String },

    /// Writes the attribute and a live property of the same name.
    Mirrored,

    /// Writes the serialized attribute.
    Generic,
}

/// Memoized setter for one attribute of one output node.
#[derive(Debug)]
pub struct AttributeSetter {
    name: String,
    kind: SetterKind,
    last: Option<AttrValue>,
}

impl AttributeSetter {
    /// Pick the specialization for `name` on `node`.
    pub fn new<H>(host: &H, node: NodeId, name: &str, config: &Config) -> Self
    where
        H: Host + ?Sized,
    {
        let kind = if config.is_event_attribute(name) {
            SetterKind::Event {
                event: config.event_name(name),
            }
        } else if config.is_mirrored(name) && host.has_property(node, name) {
            SetterKind::Mirrored
        } else {
            SetterKind::Generic
        };

        Self {
            name: name.to_string(),
            kind,
            last: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &SetterKind {
        &self.kind
    }

    /// Last value applied through this setter.
    pub fn last(&self) -> Option<&AttrValue> {
        self.last.as_ref()
    }

    /// Apply `value` (`None` removes). Returns whether the host was touched.
    pub fn apply<H>(&mut self, host: &mut H, node: NodeId, value: Option<&AttrValue>) -> bool
    where
        H: Host + ?Sized,
    {
        if self.last.as_ref() == value {
            return false;
        }

        match &self.kind {
            SetterKind::Event { event } => {
                if let Some(AttrValue::Handler(previous)) = &self.last {
                    host.remove_listener(node, event, previous);
                }
                match value {
                    Some(AttrValue::Handler(handler)) => host.add_listener(node, event, handler),
                    Some(other) => {
                        warn!(attribute = %self.name, value = ?other, "event attribute given a non-handler value");
                    }
                    None => {}
                }
            }
            SetterKind::Mirrored => match value.and_then(AttrValue::serialized) {
                Some(text) => {
                    host.set_attribute(node, &self.name, text);
                    host.set_property(node, &self.name, text);
                }
                None => {
                    host.remove_attribute(node, &self.name);
                    host.set_property(node, &self.name, "");
                }
            },
            SetterKind::Generic => {
                if let Some(value @ (AttrValue::Handler(_) | AttrValue::Ref(_))) = value {
                    warn!(attribute = %self.name, value = ?value, "value cannot be serialized; removing attribute");
                }
                match value.and_then(AttrValue::serialized) {
                    Some(text) => host.set_attribute(node, &self.name, text),
                    None => host.remove_attribute(node, &self.name),
                }
            }
        }

        self.last = value.cloned();
        true
    }
}
