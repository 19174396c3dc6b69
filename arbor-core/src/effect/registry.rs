//! Effect Registry
//!
//! Holds a component's effects in registration order. Notifications fan
//! out to every effect; a phase trigger activates the due effects of that
//! phase, in order, stopping at the first failure.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::phased::{EffectId, EffectState, Phase, PhasedEffect};
use crate::error::Result;
use crate::tracking::Change;

type Effects = RefCell<Vec<Rc<PhasedEffect>>>;

#[derive(Default)]
pub struct EffectRegistry {
    effects: Rc<Effects>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an effect. It stays armed until the returned handle is
    /// used to unsubscribe or the registry is torn down.
    pub fn register(&self, effect: PhasedEffect) -> EffectHandle {
        let effect = Rc::new(effect);
        debug!(effect = effect.id().raw(), phase = ?effect.phase(), "effect registered");
        let handle = EffectHandle {
            id: effect.id(),
            effect: Rc::downgrade(&effect),
            registry: Rc::downgrade(&self.effects),
        };
        self.effects.borrow_mut().push(effect);
        handle
    }

    /// Deliver a notification to every effect.
    pub fn notify(&self, change: &Change) {
        for effect in self.effects.borrow().iter() {
            effect.observe(change);
        }
    }

    /// Run the trigger point of `phase`. Returns how many callbacks ran.
    ///
    /// Effects registered or unsubscribed by a callback take part from the
    /// next trigger on.
    pub fn run_phase(&self, phase: Phase) -> Result<usize> {
        let snapshot: Vec<Rc<PhasedEffect>> = self
            .effects
            .borrow()
            .iter()
            .filter(|effect| effect.phase() == phase)
            .cloned()
            .collect();

        let mut ran = 0;
        for effect in snapshot {
            if effect.activate()? {
                ran += 1;
            }
        }
        Ok(ran)
    }

    /// Tear down every effect, running outstanding cleanups in
    /// registration order.
    pub fn tear_down_all(&self) {
        let effects = std::mem::take(&mut *self.effects.borrow_mut());
        for effect in effects {
            effect.tear_down();
        }
    }

    pub fn len(&self) -> usize {
        self.effects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.effects.borrow().iter()).finish()
    }
}

/// Returned by registration; unsubscribes the effect.
#[derive(Clone)]
pub struct EffectHandle {
    id: EffectId,
    effect: Weak<PhasedEffect>,
    registry: Weak<Effects>,
}

impl EffectHandle {
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Tear the effect down and drop it from the registry. Outstanding
    /// cleanup runs synchronously.
    pub fn unsubscribe(&self) {
        if let Some(effects) = self.registry.upgrade() {
            effects.borrow_mut().retain(|effect| effect.id() != self.id);
        }
        if let Some(effect) = self.effect.upgrade() {
            effect.tear_down();
        }
    }

    /// `TornDown` once the effect is gone.
    pub fn state(&self) -> EffectState {
        self.effect
            .upgrade()
            .map_or(EffectState::TornDown, |effect| effect.state())
    }

    pub fn activations(&self) -> u64 {
        self.effect.upgrade().map_or(0, |effect| effect.activations())
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
