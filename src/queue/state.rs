//! Queue state and admission result types.

use std::fmt;

/// Lifecycle state of a [`DedupQueue`](super::DedupQueue).
///
/// Transitions are one-directional: `Open -> Draining -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    /// Accepts new entries; takers wait while empty.
    #[default]
    Open,
    /// No new entries accepted; pending entries are still served.
    Draining,
    /// Drained and empty; every take returns immediately with nothing.
    Closed,
}

impl QueueState {
    /// Returns the log-friendly string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }

    /// Returns true once the queue stopped accepting new entries.
    #[must_use]
    pub fn is_draining_or_closed(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of [`DedupQueue::try_add`](super::DedupQueue::try_add).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The URL was queued.
    Added,
    /// The URL was already pending; nothing changed.
    Duplicate,
    /// The queue is draining or closed; nothing changed.
    Draining,
}

impl Admission {
    /// Returns true if the URL was queued.
    #[must_use]
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added)
    }
}
