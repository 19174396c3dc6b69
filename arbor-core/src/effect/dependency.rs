//! Dependency Selection
//!
//! Effects declare what they depend on through a selector that runs once,
//! at registration, against [`Inputs`]: a read-only view of every named
//! input the component has registered. Each selected [`Dependency`] pairs a
//! name with an accessor returning the input's current value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::tracking::{Change, ChangeKind};

/// Current-value accessor of a named input.
pub type Accessor = Rc<dyn Fn() -> Value>;

/// One entry of an effect's dependency list.
#[derive(Clone)]
pub struct Dependency {
    kind: ChangeKind,
    name: String,
    accessor: Accessor,
}

impl Dependency {
    pub fn new(kind: ChangeKind, name: &str, accessor: impl Fn() -> Value + 'static) -> Self {
        Self {
            kind,
            name: name.to_string(),
            accessor: Rc::new(accessor),
        }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the input's current value.
    pub fn value(&self) -> Value {
        (self.accessor)()
    }

    /// Whether a notification refers to this input. Attribute names compare
    /// case-insensitively, state and child-collection names exactly.
    pub fn matches(&self, change: &Change) -> bool {
        if change.kind() != self.kind {
            return false;
        }
        match self.kind {
            ChangeKind::Attribute => change.name().eq_ignore_ascii_case(&self.name),
            ChangeKind::State | ChangeKind::Children => change.name() == self.name,
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

/// Read-only view of a component's named inputs.
#[derive(Default)]
pub struct Inputs {
    entries: RefCell<IndexMap<String, (ChangeKind, Accessor)>>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, kind: ChangeKind, name: &str, accessor: Accessor) {
        let key = match kind {
            ChangeKind::Attribute => name.to_lowercase(),
            ChangeKind::State | ChangeKind::Children => name.to_string(),
        };
        self.entries.borrow_mut().insert(key, (kind, accessor));
    }

    /// Select an input as a dependency. Falls back to a case-insensitive
    /// lookup for attributes.
    pub fn select(&self, name: &str) -> Option<Dependency> {
        let entries = self.entries.borrow();
        let (key, (kind, accessor)) = match entries.get_key_value(name) {
            Some(found) => found,
            None => {
                let lower = name.to_lowercase();
                let (key, entry) = entries.get_key_value(lower.as_str())?;
                if entry.0 != ChangeKind::Attribute {
                    return None;
                }
                (key, entry)
            }
        };
        Some(Dependency {
            kind: *kind,
            name: key.clone(),
            accessor: Rc::clone(accessor),
        })
    }

    /// Select several inputs, skipping unknown names.
    pub fn select_all<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Vec<Dependency> {
        names.into_iter().filter_map(|name| self.select(name)).collect()
    }

    /// Current value of an input.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.select(name).map(|dep| dep.value())
    }

    pub fn kind(&self, name: &str) -> Option<ChangeKind> {
        self.select(name).map(|dep| dep.kind)
    }

    /// Registered input names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl fmt::Debug for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs() -> Inputs {
        let inputs = Inputs::new();
        inputs.register(ChangeKind::Attribute, "maxLength", Rc::new(|| json!(8)));
        inputs.register(ChangeKind::State, "count", Rc::new(|| json!(1)));
        inputs.register(ChangeKind::Children, "items", Rc::new(|| json!([])));
        inputs
    }

    #[test]
    fn select_and_read() {
        let inputs = inputs();
        let dep = inputs.select("count").unwrap();
        assert_eq!(dep.kind(), ChangeKind::State);
        assert_eq!(dep.value(), json!(1));
        assert_eq!(inputs.get("maxlength"), Some(json!(8)));
        assert_eq!(inputs.names(), vec!["maxlength", "count", "items"]);
    }

    #[test]
    fn attribute_lookup_is_case_insensitive() {
        let inputs = inputs();
        let dep = inputs.select("MaxLength").unwrap();
        assert_eq!(dep.name(), "maxlength");

        assert!(dep.matches(&Change::Attribute {
            name: "MAXLENGTH".to_string(),
            previous: Value::Null,
            current: json!(3),
        }));
    }

    #[test]
    fn state_lookup_is_exact() {
        let inputs = inputs();
        assert!(inputs.select("Count").is_none());

        let dep = inputs.select("count").unwrap();
        assert!(!dep.matches(&Change::State {
            name: "Count".to_string(),
            previous: Value::Null,
            current: Value::Null,
        }));
    }

    #[test]
    fn kinds_must_agree() {
        let dep = Dependency::new(ChangeKind::State, "items", || Value::Null);
        assert!(!dep.matches(&Change::Children {
            name: "items".to_string(),
            changes: Default::default(),
        }));
    }

    #[test]
    fn select_all_skips_unknown() {
        let deps = inputs().select_all(["count", "missing", "items"]);
        let names: Vec<&str> = deps.iter().map(Dependency::name).collect();
        assert_eq!(names, vec!["count", "items"]);
    }
}
