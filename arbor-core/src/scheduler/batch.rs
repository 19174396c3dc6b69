//! Update Scheduler
//!
//! Coalesces "something changed" requests into a single deferred pass.
//!
//! # States
//!
//! ```text
//! Idle --request()--> Waiting --microtask--> Running --return--> Idle
//!                        ^                      |
//!                        +------request()-------+
//! ```
//!
//! Requests while `Waiting` are absorbed. The pass leaves `Waiting` before
//! the callback runs, so a request issued by the callback itself schedules
//! exactly one new pass instead of being swallowed. A guard restores `Idle`
//! when the callback returns, fails or panics. If the deferral is drained
//! from inside the callback, the nested pass is rescheduled once the running
//! one returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::microtask::Deferral;
use crate::error::{Error, Result};

/// Work returned by a pass to run once the pass has been committed.
pub type AfterCommit = Box<dyn FnOnce() -> Result<()>>;

/// The pass callback.
pub type PassFn = dyn FnMut() -> Result<Option<AfterCommit>>;

/// Pending-update state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No pass pending.
    Idle,

    /// A pass has been deferred and has not started yet.
    Waiting,

    /// The pass callback is executing.
    Running,
}

/// Coalesces update requests into one deferred pass per turn.
///
/// Clones share the same pending flag and callback.
#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Rc<SchedulerInner>,
}

struct SchedulerInner {
    state: Cell<PassState>,
    callback: RefCell<Box<PassFn>>,
    deferral: Box<dyn Deferral>,
    passes: Cell<u64>,
    /// Set when a deferred pass fired while the callback was still running.
    rerun: Cell<bool>,
}

/// Puts the scheduler back to `Idle` when the pass ends, however it ends.
/// A request made during the pass has already moved it to `Waiting`, which
/// is left alone.
struct RunningGuard<'a> {
    state: &'a Cell<PassState>,
}

impl<'a> RunningGuard<'a> {
    fn enter(state: &'a Cell<PassState>) -> Self {
        state.set(PassState::Running);
        Self { state }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if self.state.get() == PassState::Running {
            self.state.set(PassState::Idle);
        }
    }
}

impl UpdateScheduler {
    /// Create a scheduler that runs `callback` once per coalesced batch of
    /// requests, deferred through `deferral`.
    pub fn new<D, F>(deferral: D, callback: F) -> Self
    where
        D: Deferral + 'static,
        F: FnMut() -> Result<Option<AfterCommit>> + 'static,
    {
        Self {
            inner: Rc::new(SchedulerInner {
                state: Cell::new(PassState::Idle),
                callback: RefCell::new(Box::new(callback)),
                deferral: Box::new(deferral),
                passes: Cell::new(0),
                rerun: Cell::new(false),
            }),
        }
    }

    /// Ask for a pass. Returns whether a new pass was scheduled; `false`
    /// means one is already pending and will observe this change too.
    pub fn request(&self) -> bool {
        if self.inner.state.get() == PassState::Waiting {
            trace!("update already pending");
            return false;
        }

        SchedulerInner::schedule(&self.inner);
        true
    }

    pub fn state(&self) -> PassState {
        self.inner.state.get()
    }

    /// Whether a deferred pass is waiting to run.
    pub fn is_pending(&self) -> bool {
        self.state() == PassState::Waiting
    }

    /// Number of passes whose callback completed successfully.
    pub fn passes(&self) -> u64 {
        self.inner.passes.get()
    }
}

impl SchedulerInner {
    fn schedule(inner: &Rc<Self>) {
        inner.state.set(PassState::Waiting);
        let weak: Weak<SchedulerInner> = Rc::downgrade(inner);
        inner.deferral.defer(Box::new(move || match weak.upgrade() {
            Some(inner) => Self::run_pass(&inner),
            None => Ok(()),
        }));
    }

    fn run_pass(inner: &Rc<Self>) -> Result<()> {
        let outcome = {
            let Ok(mut callback) = inner.callback.try_borrow_mut() else {
                // The deferral was drained from inside the callback. Hand the
                // request back to the running pass, which reschedules it.
                debug!("pass fired inside a running pass; deferring until it returns");
                inner.state.set(PassState::Running);
                inner.rerun.set(true);
                return Ok(());
            };
            let _running = RunningGuard::enter(&inner.state);
            debug!(pass = inner.passes.get() + 1, "update pass started");
            (&mut **callback)()
        };

        if inner.rerun.replace(false) && inner.state.get() == PassState::Idle {
            Self::schedule(inner);
        }
        let after_commit = outcome?;

        inner.passes.set(inner.passes.get() + 1);
        debug!(pass = inner.passes.get(), "update pass committed");

        if let Some(after_commit) = after_commit {
            after_commit().map_err(Error::into_after_commit)?;
        }
        Ok(())
    }
}

impl fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("state", &self.state())
            .field("passes", &self.passes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::MicrotaskQueue;
    use std::panic::{self, AssertUnwindSafe};

    fn counting(queue: &MicrotaskQueue) -> (UpdateScheduler, Rc<Cell<u32>>) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        let scheduler = UpdateScheduler::new(queue.clone(), move || {
            count_clone.set(count_clone.get() + 1);
            Ok(None)
        });
        (scheduler, count)
    }

    #[test]
    fn requests_in_one_turn_coalesce() {
        let queue = MicrotaskQueue::new();
        let (scheduler, count) = counting(&queue);

        assert!(scheduler.request());
        for _ in 0..9 {
            assert!(!scheduler.request());
        }
        assert!(scheduler.is_pending());
        assert_eq!(count.get(), 0);

        queue.run_until_idle().unwrap();
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.state(), PassState::Idle);
    }

    #[test]
    fn separate_turns_get_separate_passes() {
        let queue = MicrotaskQueue::new();
        let (scheduler, count) = counting(&queue);

        scheduler.request();
        queue.run_until_idle().unwrap();
        scheduler.request();
        queue.run_until_idle().unwrap();

        assert_eq!(count.get(), 2);
        assert_eq!(scheduler.passes(), 2);
    }

    #[test]
    fn request_inside_pass_schedules_one_more() {
        let queue = MicrotaskQueue::new();
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<UpdateScheduler>>> = Rc::new(RefCell::new(None));

        let count_clone = count.clone();
        let slot_clone = slot.clone();
        let scheduler = UpdateScheduler::new(queue.clone(), move || {
            count_clone.set(count_clone.get() + 1);
            if count_clone.get() == 1 {
                if let Some(scheduler) = slot_clone.borrow().as_ref() {
                    assert_eq!(scheduler.state(), PassState::Running);
                    assert!(scheduler.request());
                    assert!(!scheduler.request());
                }
            }
            Ok(None)
        });
        *slot.borrow_mut() = Some(scheduler.clone());

        scheduler.request();
        assert_eq!(queue.run_one().map(|r| r.is_ok()), Some(true));
        assert_eq!(count.get(), 1);
        assert!(scheduler.is_pending());

        queue.run_until_idle().unwrap();
        assert_eq!(count.get(), 2);
        assert!(queue.is_empty());
        assert_eq!(scheduler.state(), PassState::Idle);
    }

    #[test]
    fn draining_inside_pass_reschedules() {
        let queue = MicrotaskQueue::new();
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<UpdateScheduler>>> = Rc::new(RefCell::new(None));

        let count_clone = count.clone();
        let slot_clone = slot.clone();
        let nested = queue.clone();
        let scheduler = UpdateScheduler::new(queue.clone(), move || {
            count_clone.set(count_clone.get() + 1);
            if count_clone.get() == 1 {
                if let Some(scheduler) = slot_clone.borrow().as_ref() {
                    assert!(scheduler.request());
                }
                assert_eq!(nested.run_until_idle().unwrap(), 1);
            }
            Ok(None)
        });
        *slot.borrow_mut() = Some(scheduler.clone());

        scheduler.request();
        queue.run_until_idle().unwrap();
        assert_eq!(count.get(), 2);
        assert_eq!(scheduler.state(), PassState::Idle);

        assert!(scheduler.request());
        queue.run_until_idle().unwrap();
        assert_eq!(count.get(), 3);
        assert_eq!(scheduler.passes(), 3);
    }

    #[test]
    fn failed_pass_does_not_wedge() {
        let queue = MicrotaskQueue::new();
        let fail = Rc::new(Cell::new(true));
        let fail_clone = fail.clone();
        let scheduler = UpdateScheduler::new(queue.clone(), move || {
            if fail_clone.get() {
                return Err(Error::msg("render exploded"));
            }
            Ok(None)
        });

        scheduler.request();
        let err = queue.run_until_idle().unwrap_err();
        assert_eq!(err.to_string(), "callback failed: render exploded");
        assert_eq!(scheduler.state(), PassState::Idle);

        fail.set(false);
        assert!(scheduler.request());
        queue.run_until_idle().unwrap();
        assert_eq!(scheduler.passes(), 1);
    }

    #[test]
    fn panicking_pass_does_not_wedge() {
        let queue = MicrotaskQueue::new();
        let scheduler = UpdateScheduler::new(queue.clone(), || panic!("boom"));

        scheduler.request();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| queue.run_until_idle()));
        assert!(outcome.is_err());
        assert_eq!(scheduler.state(), PassState::Idle);
        assert!(scheduler.request());
    }

    #[test]
    fn after_commit_runs_after_callback() {
        let queue = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let scheduler = UpdateScheduler::new(queue.clone(), move || {
            log_clone.borrow_mut().push("pass");
            let log = log_clone.clone();
            Ok(Some(Box::new(move || {
                log.borrow_mut().push("after");
                Ok(())
            }) as AfterCommit))
        });

        scheduler.request();
        queue.run_until_idle().unwrap();
        assert_eq!(*log.borrow(), vec!["pass", "after"]);
    }

    #[test]
    fn after_commit_failure_is_tagged() {
        let queue = MicrotaskQueue::new();
        let scheduler = UpdateScheduler::new(queue.clone(), || {
            Ok(Some(Box::new(|| Err(Error::msg("late"))) as AfterCommit))
        });

        scheduler.request();
        let err = queue.run_until_idle().unwrap_err();
        assert!(matches!(err, Error::AfterCommit(_)));
        assert_eq!(scheduler.passes(), 1);
    }

    #[test]
    fn dropped_scheduler_pass_is_a_no_op() {
        let queue = MicrotaskQueue::new();
        let (scheduler, count) = counting(&queue);

        scheduler.request();
        drop(scheduler);

        assert_eq!(queue.run_until_idle().unwrap(), 1);
        assert_eq!(count.get(), 0);
    }
}
