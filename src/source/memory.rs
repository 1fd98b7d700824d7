//! In-process change log.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ChangeSource, QueryError, RawChangeEntry};

/// Change log held in memory.
///
/// Useful when the host process produces change records itself, and as a
/// stand-in for a remote list in tests. Queries can be made to fail on demand
/// to exercise the poller's retry path.
#[derive(Debug, Default)]
pub struct MemoryChangeSource {
    entries: Mutex<Vec<RawChangeEntry>>,
    failures_remaining: AtomicUsize,
    queries: Mutex<Vec<Option<DateTime<Utc>>>>,
}

impl MemoryChangeSource {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding `entries`.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = RawChangeEntry>) -> Self {
        let source = Self::new();
        source.extend(entries);
        source
    }

    /// Appends a well-formed entry.
    pub fn push(&self, created_at: DateTime<Utc>, url: impl Into<String>) {
        self.push_raw(RawChangeEntry::new(created_at, url));
    }

    /// Appends an entry as-is, malformed or not.
    pub fn push_raw(&self, entry: RawChangeEntry) {
        lock(&self.entries).push(entry);
    }

    /// Appends several entries.
    pub fn extend(&self, entries: impl IntoIterator<Item = RawChangeEntry>) {
        lock(&self.entries).extend(entries);
    }

    /// Makes the next `count` queries fail with [`QueryError::Unavailable`].
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Returns the `since` argument of every query made so far, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<Option<DateTime<Utc>>> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl ChangeSource for MemoryChangeSource {
    async fn query(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawChangeEntry>, QueryError> {
        lock(&self.queries).push(since);

        let fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(QueryError::unavailable("injected query failure"));
        }

        let mut matching: Vec<RawChangeEntry> = lock(&self.entries)
            .iter()
            .filter(|entry| match (since, entry.created_at) {
                (None, _) => true,
                (Some(since), Some(created)) => created > since,
                (Some(_), None) => false,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|entry| entry.created_at);
        Ok(matching)
    }

    fn describe(&self) -> String {
        "memory change log".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
