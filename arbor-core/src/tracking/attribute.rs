//! Attribute Inputs
//!
//! A typed view of one attribute on a component's host element. The cached
//! value moves in two directions:
//!
//! - down: an external write to the host attribute is re-parsed and
//!   compared with the cache ([`Attribute::sync_down`]); identical values
//!   are suppressed.
//! - up: the component assigns a value ([`Attribute::set`]) which is
//!   serialized back into the host attribute.
//!
//! Either direction raises an attribute notification and requests a pass
//! when the value actually changed.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use super::change::{snapshot, Change, ChangeSink};
use super::parsers::Parser;

/// Values that can live in an attribute.
pub trait AttributeValue: Clone + PartialEq + Serialize + 'static {
    /// Serialized attribute text; `None` means the attribute is absent.
    fn to_attribute(&self) -> Option<String>;
}

impl AttributeValue for String {
    fn to_attribute(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl AttributeValue for bool {
    fn to_attribute(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl AttributeValue for f64 {
    fn to_attribute(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl AttributeValue for i64 {
    fn to_attribute(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    fn to_attribute(&self) -> Option<String> {
        self.as_ref().and_then(AttributeValue::to_attribute)
    }
}

/// Typed attribute input. Clones share the same cache.
pub struct Attribute<V: AttributeValue> {
    inner: Rc<AttributeInner<V>>,
}

struct AttributeInner<V> {
    name: String,
    parser: Parser<V>,
    current: RefCell<V>,
    sink: RefCell<Option<Weak<dyn ChangeSink>>>,
}

impl<V: AttributeValue> Attribute<V> {
    /// Create an attribute whose initial value is the parse of an absent
    /// attribute. Names are lowercased.
    pub fn new<P>(name: &str, parser: P) -> Self
    where
        P: Fn(Option<&str>) -> V + 'static,
    {
        let initial = parser(None);
        Self {
            inner: Rc::new(AttributeInner {
                name: name.to_lowercase(),
                parser: Box::new(parser),
                current: RefCell::new(initial),
                sink: RefCell::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn get(&self) -> V {
        self.inner.current.borrow().clone()
    }

    /// Assign from the component side. The host attribute follows.
    pub fn set(&self, value: V) {
        let previous = {
            let mut current = self.inner.current.borrow_mut();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value.clone())
        };

        if let Some(sink) = self.sink() {
            sink.write_attribute(&self.inner.name, value.to_attribute().as_deref());
            sink.request_update();
            sink.changed(Change::Attribute {
                name: self.inner.name.clone(),
                previous: snapshot(&previous),
                current: snapshot(&value),
            });
        }
    }

    /// Reconcile the cache with a raw value read from the host. Returns
    /// whether the parsed value differed.
    pub fn sync_down(&self, raw: Option<&str>) -> bool {
        let parsed = (self.inner.parser)(raw);
        let previous = {
            let mut current = self.inner.current.borrow_mut();
            if *current == parsed {
                trace!(attribute = %self.inner.name, "attribute rewritten with an identical value");
                return false;
            }
            std::mem::replace(&mut *current, parsed.clone())
        };

        if let Some(sink) = self.sink() {
            sink.request_update();
            sink.changed(Change::Attribute {
                name: self.inner.name.clone(),
                previous: snapshot(&previous),
                current: snapshot(&parsed),
            });
        }
        true
    }

    /// Replace the cache from a raw value without notifying anyone.
    pub fn reset(&self, raw: Option<&str>) {
        let parsed = (self.inner.parser)(raw);
        *self.inner.current.borrow_mut() = parsed;
    }

    pub(crate) fn attach(&self, sink: Weak<dyn ChangeSink>) {
        *self.inner.sink.borrow_mut() = Some(sink);
    }

    fn sink(&self) -> Option<Rc<dyn ChangeSink>> {
        self.inner.sink.borrow().as_ref().and_then(Weak::upgrade)
    }
}

impl<V: AttributeValue> Clone for Attribute<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V: AttributeValue + fmt::Debug> fmt::Debug for Attribute<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.inner.name)
            .field("value", &*self.inner.current.borrow())
            .finish()
    }
}

/// Type-erased attribute, as held by a component.
pub(crate) trait ObservedAttribute {
    fn sync_down(&self, raw: Option<&str>) -> bool;
    fn snapshot(&self) -> Value;
}

impl<V: AttributeValue> ObservedAttribute for Attribute<V> {
    fn sync_down(&self, raw: Option<&str>) -> bool {
        Attribute::sync_down(self, raw)
    }

    fn snapshot(&self) -> Value {
        snapshot(&*self.inner.current.borrow())
    }
}
