//! Error Types
//!
//! Reconciliation itself never fails: a type mismatch is handled by replacing
//! the node. Errors come from user callbacks (render functions, effects,
//! after-commit work), from configuration parsing, and from host misuse.

use thiserror::Error;

use crate::host::NodeId;

/// Boxed error produced by user code.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The render function of a component failed.
    #[error("render failed: {0}")]
    Render(#[source] BoxError),

    /// An effect callback failed during activation.
    #[error("effect callback failed: {0}")]
    Effect(#[source] BoxError),

    /// Work scheduled to run after a pass was committed failed.
    #[error("after-commit callback failed: {0}")]
    AfterCommit(#[source] BoxError),

    /// A user callback failed outside of the phases above.
    #[error("callback failed: {0}")]
    Callback(#[source] BoxError),

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A host operation referenced a node that does not exist.
    #[error("output node {0} does not exist")]
    UnknownNode(NodeId),

    /// The output host was already borrowed when the engine needed it.
    #[error("output host is busy")]
    HostBusy,

    /// The operation requires a connected component.
    #[error("component is not connected")]
    NotConnected,
}

impl Error {
    /// Wrap an arbitrary error raised by user code.
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + 'static,
    {
        Self::Callback(Box::new(err))
    }

    /// Build a callback error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Callback(message.into())
    }

    /// Re-tag a callback error as having come from an effect.
    pub(crate) fn into_effect(self) -> Self {
        match self {
            Self::Callback(inner) => Self::Effect(inner),
            other => other,
        }
    }

    /// Re-tag a callback error as having come from a render function.
    pub(crate) fn into_render(self) -> Self {
        match self {
            Self::Callback(inner) => Self::Render(inner),
            other => other,
        }
    }

    /// Re-tag a callback error as having come from after-commit work.
    pub(crate) fn into_after_commit(self) -> Self {
        match self {
            Self::Callback(inner) => Self::AfterCommit(inner),
            other => other,
        }
    }
}
