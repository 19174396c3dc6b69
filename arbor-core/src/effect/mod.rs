//! Dependency-tracked Effects
//!
//! An effect is a user callback that runs at a fixed point of the update
//! pass and re-runs only when something it declared actually changed.
//!
//! # Dependency lists
//!
//! The selector given at registration decides the trigger:
//!
//! | selector returns | runs                                      |
//! |------------------|-------------------------------------------|
//! | `None`           | on every pass of its phase                |
//! | `Some(vec![])`   | once, at its first trigger                |
//! | `Some(deps)`     | first trigger, then when a dep changed    |
//!
//! Changes accumulate in a dirty flag between triggers, so an input that
//! changes N times within one window causes one activation.

mod dependency;
mod phased;
mod registry;

pub use dependency::{Accessor, Dependency, Inputs};
pub use phased::{Activation, Cleanup, EffectFn, EffectId, EffectState, Phase, PhasedEffect, Trigger};
pub use registry::{EffectHandle, EffectRegistry};
