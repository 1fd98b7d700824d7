//! Incremental polling of the change log.
//!
//! A [`Poller`] owns the [`Cursor`]. One cycle queries the change source for
//! entries newer than the cursor, moves the cursor over every entry it
//! observes and offers each entry's URL to the [`DedupQueue`]. Cycles run
//! one after another on a single task, so they never overlap.
//!
//! # Failure policy
//!
//! - A failed query aborts the cycle before anything changes; the failure is
//!   reported to the sink and the next tick retries with the same cursor.
//! - A malformed entry is skipped; the cycle continues.
//! - A draining queue ends the cycle early without error.

mod cursor;

pub use cursor::Cursor;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use crate::outcome::{CycleFailure, ObservationSink};
use crate::queue::{Admission, DedupQueue};
use crate::source::{ChangeSource, QueryError};

/// What one successful poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Cursor value the query used.
    pub since: Option<DateTime<Utc>>,
    /// Entries returned by the change source.
    pub fetched: usize,
    /// URLs newly queued.
    pub enqueued: usize,
    /// URLs that were already pending.
    pub duplicates: usize,
    /// Malformed entries skipped.
    pub skipped: usize,
    /// True if the queue was draining and the rest of the batch was dropped.
    pub stopped_early: bool,
    /// Cursor value after the cycle.
    pub cursor: Option<DateTime<Utc>>,
}

/// Single owner of the cursor; runs poll cycles.
pub struct Poller {
    source: Arc<dyn ChangeSource>,
    queue: Arc<DedupQueue>,
    sink: Arc<dyn ObservationSink>,
    cursor: Cursor,
    watermark: watch::Sender<Option<DateTime<Utc>>>,
    verbose: bool,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("source", &self.source.describe())
            .field("cursor", &self.cursor)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Creates a poller with an unset cursor.
    #[must_use]
    pub fn new(
        source: Arc<dyn ChangeSource>,
        queue: Arc<DedupQueue>,
        sink: Arc<dyn ObservationSink>,
    ) -> Self {
        let (watermark, _) = watch::channel(None);
        Self {
            source,
            queue,
            sink,
            cursor: Cursor::new(),
            watermark,
            verbose: false,
        }
    }

    /// Logs each query and every entry found at `info` instead of `debug`.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Returns the current cursor.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Returns a read-only view of the cursor that follows every cycle.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.watermark.subscribe()
    }

    /// Runs one cycle.
    ///
    /// # Errors
    ///
    /// Returns the [`QueryError`] if the change source query fails. Nothing
    /// was queued and the cursor is unchanged in that case.
    #[instrument(skip(self), fields(source = %self.source.describe(), since = ?self.cursor.last_seen()))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, QueryError> {
        let since = self.cursor.last_seen();
        if self.verbose {
            info!(since = ?since, "Looking for changed files");
        }

        let entries = self.source.query(since).await?;
        if self.verbose {
            info!(found = entries.len(), "Found changed files");
            for entry in &entries {
                info!(created = ?entry.created_at, url = entry.url.as_deref().unwrap_or(""), "changed file");
            }
        }

        let mut report = CycleReport {
            since,
            fetched: entries.len(),
            ..CycleReport::default()
        };

        for entry in &entries {
            // Entries without a creation time cannot be placed on the
            // watermark; skip them without moving it.
            let Some(created_at) = entry.created_at else {
                trace!("skipping entry without creation time");
                report.skipped += 1;
                continue;
            };
            self.cursor.advance(created_at);

            let change = match entry.parse() {
                Ok(change) => change,
                Err(reason) => {
                    debug!(%reason, created = %created_at, "skipping malformed entry");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.queue.try_add(change.url) {
                Admission::Added => report.enqueued += 1,
                Admission::Duplicate => report.duplicates += 1,
                Admission::Draining => {
                    debug!("queue draining, dropping rest of batch");
                    report.stopped_early = true;
                    break;
                }
            }
        }

        report.cursor = self.cursor.last_seen();
        self.watermark.send_replace(report.cursor);

        debug!(
            fetched = report.fetched,
            enqueued = report.enqueued,
            duplicates = report.duplicates,
            skipped = report.skipped,
            stopped_early = report.stopped_early,
            cursor = ?report.cursor,
            "poll cycle complete"
        );
        Ok(report)
    }

    /// Runs one cycle, reporting a query failure to the sink instead of
    /// returning it.
    pub async fn poll_once(&mut self) -> Option<CycleReport> {
        let since = self.cursor.last_seen();
        match self.run_cycle().await {
            Ok(report) => Some(report),
            Err(error) => {
                self.sink.report_error(&CycleFailure::new(since, error));
                None
            }
        }
    }

    /// Runs a cycle every `interval` until `halt` is cancelled.
    ///
    /// The first cycle starts one interval after the call. Each wait starts
    /// only after the previous cycle finished. A cycle in progress is always
    /// completed; `halt` is observed between cycles. Returns the poller so
    /// the cursor survives a pause.
    pub async fn run(mut self, interval: Duration, halt: CancellationToken) -> Self {
        debug!(interval_ms = interval.as_millis(), "poll loop armed");
        loop {
            tokio::select! {
                biased;
                () = halt.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
            if halt.is_cancelled() {
                break;
            }
            self.poll_once().await;
        }
        debug!("poll loop disarmed");
        self
    }
}
