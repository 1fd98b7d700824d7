//! Deduplicating work queue for pending download URLs.
//!
//! The queue holds URLs that a poll cycle discovered and no worker has taken
//! yet. A URL can be pending at most once; after a worker takes it the same
//! URL may be queued again by a later cycle.
//!
//! # Overview
//!
//! - [`DedupQueue::try_add`] - non-blocking add-if-absent
//! - [`DedupQueue::take`] - waits for the next URL, or `None` once drained and empty
//! - [`DedupQueue::drain`] - one-way `Open -> Draining` transition
//!
//! Membership is tracked in a set keyed by the canonical URL, updated under
//! the same lock as the FIFO storage, so a concurrent `take` can never make
//! the duplicate check observe a half-removed item.
//!
//! # Example
//!
//! ```
//! use changelog_mirror::queue::{Admission, DedupQueue};
//! use url::Url;
//!
//! # async fn example() -> Result<(), url::ParseError> {
//! let queue = DedupQueue::new();
//! let url = Url::parse("https://example.com/docs/report.docx")?;
//!
//! assert_eq!(queue.try_add(url.clone()), Admission::Added);
//! assert_eq!(queue.try_add(url.clone()), Admission::Duplicate);
//!
//! queue.drain();
//! assert_eq!(queue.take().await, Some(url));
//! assert_eq!(queue.take().await, None);
//! # Ok(())
//! # }
//! ```

mod state;

pub use state::{Admission, QueueState};

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, trace};
use url::Url;

/// Pending-work queue guaranteeing unique membership while items wait.
///
/// Designed to be wrapped in `Arc` and shared between the poller and all
/// workers. Each queued URL is delivered to exactly one caller of
/// [`take`](Self::take).
#[derive(Debug, Default)]
pub struct DedupQueue {
    inner: Mutex<Inner>,
    available: Notify,
}

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<Url>,
    /// Canonical URL strings of everything in `items`.
    pending: HashSet<String>,
    state: QueueState,
}

impl DedupQueue {
    /// Creates an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `url` unless it is already pending or the queue is no longer open.
    ///
    /// Never blocks and never fails; the returned [`Admission`] tells the
    /// caller which case applied.
    pub fn try_add(&self, url: Url) -> Admission {
        let mut inner = self.lock();
        if inner.state != QueueState::Open {
            trace!(url = %url, state = %inner.state, "queue not accepting entries");
            return Admission::Draining;
        }
        if !inner.pending.insert(url.as_str().to_owned()) {
            trace!(url = %url, "already pending");
            return Admission::Duplicate;
        }
        inner.items.push_back(url);
        drop(inner);

        self.available.notify_one();
        Admission::Added
    }

    /// Takes the next pending URL, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue has been drained and no items remain;
    /// from then on every call returns `None` immediately.
    pub async fn take(&self) -> Option<Url> {
        loop {
            // Register interest before inspecting the queue so a concurrent
            // add or drain between the check and the await is not missed.
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.lock();
                if let Some(url) = inner.items.pop_front() {
                    inner.pending.remove(url.as_str());
                    return Some(url);
                }
                if inner.state != QueueState::Open {
                    if inner.state == QueueState::Draining {
                        debug!("queue drained and empty, closing");
                        inner.state = QueueState::Closed;
                    }
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stops accepting new entries. Items already pending are still served.
    ///
    /// Idempotent; calling it on a draining or closed queue has no effect.
    pub fn drain(&self) {
        let mut inner = self.lock();
        if inner.state == QueueState::Open {
            debug!(pending = inner.items.len(), "queue draining");
            inner.state = QueueState::Draining;
        }
        drop(inner);

        self.available.notify_waiters();
    }

    /// Returns the current queue state.
    #[must_use]
    pub fn state(&self) -> QueueState {
        self.lock().state
    }

    /// Returns true if `url` is pending (queued and not yet taken).
    #[must_use]
    pub fn contains(&self, url: &Url) -> bool {
        self.lock().pending.contains(url.as_str())
    }

    /// Returns the number of pending items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Returns a snapshot of the pending URLs in delivery order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Url> {
        self.lock().items.iter().cloned().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Critical sections never panic midway, so a poisoned guard still
        // holds a consistent queue.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
