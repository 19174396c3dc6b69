//! Update Scheduling
//!
//! Many inputs can change within one synchronous turn. Rather than
//! reconciling after each change, every change calls
//! [`UpdateScheduler::request`], and exactly one pass runs at the next
//! microtask boundary. That pass observes the final value of every input
//! changed during the turn.
//!
//! There is no cancellation and no timeout: once started, a pass runs to
//! completion synchronously.

mod batch;
mod microtask;

pub use batch::{AfterCommit, PassFn, PassState, UpdateScheduler};
pub use microtask::{Deferral, Microtask, MicrotaskQueue, TokioLocal};
