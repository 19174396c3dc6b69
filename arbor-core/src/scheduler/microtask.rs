//! Microtask Boundaries
//!
//! A deferred pass runs "at the next microtask boundary": after the current
//! synchronous turn has finished. What that means is up to the embedder, so
//! the scheduler only talks to a [`Deferral`].
//!
//! - [`MicrotaskQueue`] is a plain FIFO the embedder drains at the end of
//!   each turn. Deterministic, which is what the tests use.
//! - [`TokioLocal`] spawns each task onto the current tokio `LocalSet`, so
//!   it runs the next time the local executor gets control.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::error;

use crate::error::Result;

/// A unit of deferred work. Failures go to whoever drains the queue.
pub type Microtask = Box<dyn FnOnce() -> Result<()>>;

/// Something that can run a task after the current synchronous turn.
pub trait Deferral {
    fn defer(&self, task: Microtask);
}

/// FIFO of microtasks drained explicitly by the embedder.
///
/// Clones share the same queue.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    tasks: Rc<RefCell<VecDeque<Microtask>>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run the oldest task, if any.
    pub fn run_one(&self) -> Option<Result<()>> {
        let task = self.tasks.borrow_mut().pop_front()?;
        Some(task())
    }

    /// Run tasks until the queue is empty, including tasks queued while
    /// draining. Stops at the first failure and leaves the remaining tasks
    /// queued. Returns how many tasks ran.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut ran = 0;
        while let Some(outcome) = self.run_one() {
            ran += 1;
            outcome?;
        }
        Ok(ran)
    }
}

impl Deferral for MicrotaskQueue {
    fn defer(&self, task: Microtask) {
        self.tasks.borrow_mut().push_back(task);
    }
}

impl fmt::Debug for MicrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MicrotaskQueue")
            .field("len", &self.len())
            .finish()
    }
}

/// Runs deferred tasks on the current tokio `LocalSet`.
///
/// Must be used from within `LocalSet::run_until` (or a task spawned on a
/// `LocalSet`); `spawn_local` panics otherwise. Failures are logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLocal;

impl Deferral for TokioLocal {
    fn defer(&self, task: Microtask) {
        tokio::task::spawn_local(async move {
            if let Err(err) = task() {
                error!(error = %err, "deferred task failed");
            }
        });
    }
}
