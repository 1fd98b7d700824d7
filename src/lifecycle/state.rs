//! Lifecycle states and misuse errors.

use std::fmt;

use thiserror::Error;

/// Where a [`Mirror`](super::Mirror) is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Built, never started.
    #[default]
    Idle,
    /// Polling and downloading.
    Running,
    /// Downloading, not polling.
    Paused,
    /// Terminal; the queue is draining or closed.
    Stopped,
}

impl LifecycleState {
    /// Returns the state name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from misusing the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A stopped mirror cannot be started or paused again.
    #[error("mirror is stopped; build a new instance to run again")]
    AlreadyStopped,

    /// `wait` was called before `stop`.
    #[error("mirror is {state}; stop it before waiting for it")]
    NotStopped { state: LifecycleState },

    /// Worker count outside the allowed range.
    #[error("invalid concurrency {value}: must be between 0 and {max}", max = crate::download::MAX_CONCURRENCY)]
    InvalidConcurrency { value: usize },

    /// A zero-length interval.
    #[error("{name} must be greater than zero")]
    InvalidInterval { name: &'static str },

    /// The poll task ended abnormally and cannot be re-armed.
    #[error("poll loop ended abnormally and cannot be resumed")]
    PollerLost,
}
