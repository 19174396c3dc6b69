//! Configuration
//!
//! Knobs that decide how attribute names are interpreted by the reconciler
//! and how a component's root container is created. Everything has a default,
//! so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attribute names starting with this prefix bind event handlers.
    /// The remainder, lowercased, is the event name (`onClick` -> `click`).
    pub event_prefix: String,

    /// Reserved attribute name that binds a node reference instead of
    /// being written to the output node.
    pub ref_attribute: String,

    /// Attribute names that are mirrored into a live property of the same
    /// name when the output node exposes one.
    pub mirrored_properties: Vec<String>,

    /// Tag of the container node a component renders into.
    pub root_tag: String,

    /// Class names applied to the root container.
    pub root_classes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            event_prefix: "on".to_string(),
            ref_attribute: "ref".to_string(),
            mirrored_properties: vec!["value".to_string()],
            root_tag: "div".to_string(),
            root_classes: vec!["arbor-root".to_string()],
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether `name` denotes an event handler attribute.
    pub fn is_event_attribute(&self, name: &str) -> bool {
        name.len() > self.event_prefix.len() && name.starts_with(self.event_prefix.as_str())
    }

    /// Event name bound by an event handler attribute.
    pub fn event_name(&self, name: &str) -> String {
        name.strip_prefix(self.event_prefix.as_str())
            .unwrap_or(name)
            .to_lowercase()
    }

    /// Whether `name` is a candidate for value mirroring.
    pub fn is_mirrored(&self, name: &str) -> bool {
        self.mirrored_properties.iter().any(|p| p == name)
    }
}
