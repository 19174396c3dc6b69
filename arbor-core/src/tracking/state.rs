//! State Inputs
//!
//! A State is a named, component-private value. Unlike an [`Attribute`],
//! it never touches the host element; it only raises a state notification
//! and requests a pass when written with a different value.
//!
//! # Example
//!
//! ```rust,ignore
//! let count = component.state("count", 0_i64);
//!
//! count.get();               // 0
//! count.set(5);              // notifies, requests a pass
//! count.update(|n| *n += 1); // 6
//! ```
//!
//! [`Attribute`]: super::Attribute

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;
use serde_json::Value;

use super::change::{snapshot, Change, ChangeSink};

/// A component-local value.
pub struct State<T>
where
    T: Clone + PartialEq + Serialize + 'static,
{
    inner: Rc<StateInner<T>>,
}

struct StateInner<T> {
    name: String,
    value: RefCell<T>,
    sink: RefCell<Option<Weak<dyn ChangeSink>>>,
}

impl<T> State<T>
where
    T: Clone + PartialEq + Serialize + 'static,
{
    pub fn new(name: &str, value: T) -> Self {
        Self {
            inner: Rc::new(StateInner {
                name: name.to_string(),
                value: RefCell::new(value),
                sink: RefCell::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Read the value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Set a new value. Writing an equal value is a no-op.
    pub fn set(&self, value: T) {
        let previous = {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            std::mem::replace(&mut *current, value.clone())
        };
        self.notify(&previous, &value);
    }

    /// Modify the value in place.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    pub(crate) fn attach(&self, sink: Weak<dyn ChangeSink>) {
        *self.inner.sink.borrow_mut() = Some(sink);
    }

    pub(crate) fn snapshot(&self) -> Value {
        snapshot(&*self.inner.value.borrow())
    }

    fn notify(&self, previous: &T, current: &T) {
        let sink = self.inner.sink.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(sink) = sink {
            sink.request_update();
            sink.changed(Change::State {
                name: self.inner.name.clone(),
                previous: snapshot(previous),
                current: snapshot(current),
            });
        }
    }
}

impl<T> Clone for State<T>
where
    T: Clone + PartialEq + Serialize + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for State<T>
where
    T: Clone + PartialEq + Serialize + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.inner.name)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}
