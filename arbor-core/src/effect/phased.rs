//! Phased Effects
//!
//! A phased effect is a callback bound to one side of the update pass:
//! [`Phase::BeforeUpdate`] runs immediately before the tree is regenerated,
//! [`Phase::AfterUpdate`] immediately after the patch is committed.
//!
//! # Lifecycle
//!
//! ```text
//! Armed --trigger (due)--> Active --return--> Armed
//!   |                                           |
//!   +-------------- tear_down() ----------------+--> TornDown
//! ```
//!
//! Each activation first runs and discards the previous cleanup, then runs
//! the callback and keeps whatever cleanup it returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::trace;

use super::dependency::Dependency;
use crate::error::{Error, Result};
use crate::tracking::Change;

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier of a registered effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    fn next() -> Self {
        Self(EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Timing of an effect relative to the pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    BeforeUpdate,
    AfterUpdate,
}

/// Passed to the callback so it can tell its first run apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    First,
    Subsequent,
}

impl Activation {
    pub fn is_first(self) -> bool {
        self == Self::First
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    Armed,
    Active,
    TornDown,
}

/// Cleanup returned by an activation.
pub type Cleanup = Box<dyn FnOnce()>;

/// Effect callback.
pub type EffectFn = dyn FnMut(Activation) -> Result<Option<Cleanup>>;

/// When an effect is due.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// No dependency list: every trigger of the phase.
    EveryPass,

    /// Empty dependency list: the first trigger only.
    Once,

    /// Only when a listed input changed since the last trigger.
    Dependencies(SmallVec<[Dependency; 4]>),
}

impl Trigger {
    /// Build from the selector's result.
    pub fn from_selection(selection: Option<Vec<Dependency>>) -> Self {
        match selection {
            None => Self::EveryPass,
            Some(deps) if deps.is_empty() => Self::Once,
            Some(deps) => Self::Dependencies(deps.into_iter().collect()),
        }
    }
}

pub struct PhasedEffect {
    id: EffectId,
    phase: Phase,
    trigger: Trigger,
    dirty: Cell<bool>,
    state: Cell<EffectState>,
    activations: Cell<u64>,
    callback: RefCell<Option<Box<EffectFn>>>,
    cleanup: RefCell<Option<Cleanup>>,
}

impl PhasedEffect {
    pub fn new<F>(phase: Phase, trigger: Trigger, callback: F) -> Self
    where
        F: FnMut(Activation) -> Result<Option<Cleanup>> + 'static,
    {
        Self {
            id: EffectId::next(),
            phase,
            trigger,
            dirty: Cell::new(false),
            state: Cell::new(EffectState::Armed),
            activations: Cell::new(0),
            callback: RefCell::new(Some(Box::new(callback))),
            cleanup: RefCell::new(None),
        }
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn state(&self) -> EffectState {
        self.state.get()
    }

    /// Number of completed activations.
    pub fn activations(&self) -> u64 {
        self.activations.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Mark dirty when the notification matches a declared dependency.
    pub fn observe(&self, change: &Change) {
        if let Trigger::Dependencies(deps) = &self.trigger {
            if !self.dirty.get() && deps.iter().any(|dep| dep.matches(change)) {
                trace!(effect = self.id.0, input = change.name(), "effect dependency changed");
                self.dirty.set(true);
            }
        }
    }

    /// Whether the next trigger would activate this effect.
    pub fn is_due(&self) -> bool {
        if self.state.get() != EffectState::Armed {
            return false;
        }
        if self.activations.get() == 0 {
            return true;
        }
        match self.trigger {
            Trigger::EveryPass => true,
            Trigger::Once => false,
            Trigger::Dependencies(_) => self.dirty.get(),
        }
    }

    /// Trigger point. Returns whether the callback ran. The dirty flag is
    /// reset either way.
    pub fn activate(&self) -> Result<bool> {
        let due = self.is_due();
        self.dirty.set(false);
        if !due {
            return Ok(false);
        }

        let previous = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = previous {
            cleanup();
        }
        // The previous cleanup may have torn the effect down.
        if self.state.get() == EffectState::TornDown {
            return Ok(false);
        }

        let callback = self.callback.borrow_mut().take();
        let Some(mut callback) = callback else {
            return Ok(false);
        };

        let activation = if self.activations.get() == 0 {
            Activation::First
        } else {
            Activation::Subsequent
        };

        self.state.set(EffectState::Active);
        let outcome = callback(activation);

        let torn_down = self.state.get() == EffectState::TornDown;
        if !torn_down {
            self.state.set(EffectState::Armed);
            *self.callback.borrow_mut() = Some(callback);
        }

        let cleanup = outcome.map_err(Error::into_effect)?;
        self.activations.set(self.activations.get() + 1);

        match cleanup {
            Some(cleanup) if torn_down => cleanup(),
            Some(cleanup) => *self.cleanup.borrow_mut() = Some(cleanup),
            None => {}
        }
        Ok(true)
    }

    /// Stop the effect, running any outstanding cleanup. Idempotent.
    pub fn tear_down(&self) {
        if self.state.replace(EffectState::TornDown) == EffectState::TornDown {
            return;
        }
        self.callback.borrow_mut().take();
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

impl fmt::Debug for PhasedEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhasedEffect")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("trigger", &self.trigger)
            .field("state", &self.state.get())
            .field("dirty", &self.dirty.get())
            .field("activations", &self.activations.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::ChangeKind;
    use serde_json::Value;
    use std::rc::Rc;

    fn state_change(name: &str) -> Change {
        Change::State {
            name: name.to_string(),
            previous: Value::Null,
            current: Value::Null,
        }
    }

    fn deps(names: &[&str]) -> Trigger {
        Trigger::from_selection(Some(
            names
                .iter()
                .map(|name| Dependency::new(ChangeKind::State, name, || Value::Null))
                .collect(),
        ))
    }

    fn recording(trigger: Trigger) -> (PhasedEffect, Rc<RefCell<Vec<Activation>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let effect = PhasedEffect::new(Phase::AfterUpdate, trigger, move |activation| {
            log_clone.borrow_mut().push(activation);
            Ok(None)
        });
        (effect, log)
    }

    #[test]
    fn test_effect_ids_unique() {
        let (a, _) = recording(Trigger::EveryPass);
        let (b, _) = recording(Trigger::EveryPass);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_every_pass_effect() {
        let (effect, log) = recording(Trigger::EveryPass);
        assert!(effect.activate().unwrap());
        assert!(effect.activate().unwrap());
        assert_eq!(*log.borrow(), vec![Activation::First, Activation::Subsequent]);
    }

    #[test]
    fn test_once_effect() {
        let (effect, log) = recording(Trigger::from_selection(Some(Vec::new())));
        assert!(matches!(effect.trigger(), Trigger::Once));

        assert!(effect.activate().unwrap());
        effect.observe(&state_change("x"));
        assert!(!effect.activate().unwrap());
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_dependency_gating() {
        let (effect, log) = recording(deps(&["x"]));
        assert!(effect.activate().unwrap());

        effect.observe(&state_change("y"));
        assert!(!effect.activate().unwrap());

        for _ in 0..5 {
            effect.observe(&state_change("x"));
        }
        assert!(effect.is_dirty());
        assert!(effect.activate().unwrap());
        assert!(!effect.is_dirty());
        assert!(!effect.activate().unwrap());

        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_cleanup_runs_before_next_activation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let effect = PhasedEffect::new(Phase::BeforeUpdate, Trigger::EveryPass, move |activation| {
            let n = log_clone.borrow().len();
            log_clone.borrow_mut().push(format!("run {n} {activation:?}"));
            let log_cleanup = log_clone.clone();
            Ok(Some(Box::new(move || log_cleanup.borrow_mut().push("cleanup".to_string())) as Cleanup))
        });

        effect.activate().unwrap();
        effect.activate().unwrap();
        effect.tear_down();
        effect.tear_down();

        assert_eq!(
            *log.borrow(),
            vec!["run 0 First", "cleanup", "run 2 Subsequent", "cleanup"]
        );
        assert_eq!(effect.state(), EffectState::TornDown);
        assert!(!effect.activate().unwrap());
    }

    #[test]
    fn test_failed_activation_propagates() {
        let effect = PhasedEffect::new(Phase::AfterUpdate, Trigger::EveryPass, |_| {
            Err(Error::msg("boom"))
        });
        let err = effect.activate().unwrap_err();
        assert!(matches!(err, Error::Effect(_)));
        assert_eq!(effect.state(), EffectState::Armed);
        assert_eq!(effect.activations(), 0);
    }
}
