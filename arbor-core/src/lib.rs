//! Arbor Core
//!
//! This crate provides the update engine behind Arbor components.
//! It implements:
//!
//! - A positional reconciler that patches a live output tree from a fresh
//!   declarative tree on every pass
//! - An update scheduler that coalesces change requests into one deferred
//!   pass per turn
//! - Dependency-tracked effects that run before or after each pass
//!
//! Everything is single-threaded: state lives behind `Rc`/`RefCell`, and the
//! only suspension point is the deferred pass.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `vdom`: Declarative trees, attribute setters and the retained tree
//! - `host`: The output host abstraction and an in-memory implementation
//! - `scheduler`: Pass coalescing and microtask deferral
//! - `tracking`: Named inputs (attributes, state, child collections)
//! - `effect`: Phased effects and their dependency lists
//! - `lifecycle`: The per-component event bus
//! - `component`: Ties the pieces together for one host element
//!
//! # Example
//!
//! ```rust,ignore
//! use std::{cell::RefCell, rc::Rc};
//! use arbor_core::host::{Host, MemoryHost};
//! use arbor_core::scheduler::MicrotaskQueue;
//! use arbor_core::vdom::VElement;
//! use arbor_core::{Component, Config};
//!
//! let mut host = MemoryHost::new();
//! let element = host.create_element("x-counter");
//! let queue = MicrotaskQueue::new();
//! let component = Component::new(Rc::new(RefCell::new(host)), element, Config::default(), queue.clone())?;
//!
//! let count = component.state("count", 0_i64);
//! let c = count.clone();
//! component.set_renderer(move |_| Ok(VElement::new("span").child(c.get().to_string()).into()));
//!
//! component.connect()?;
//! count.set(1);
//! count.set(2);
//! queue.run_until_idle()?; // one pass, renders "2"
//! ```

pub mod component;
pub mod config;
pub mod effect;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod scheduler;
pub mod tracking;
pub mod vdom;

pub use component::Component;
pub use config::Config;
pub use error::{Error, Result};
