//! Batching of successful downloads into periodic summary records.
//!
//! In normal (non-verbose) operation a busy change log would produce one log
//! record per file. The [`SummaryAggregator`] sits in front of the host's sink,
//! buffers successful outcomes and flushes them as a single
//! [`DownloadSummary`] every interval and once more at shutdown. Failures and
//! cycle errors pass straight through.

use std::fmt::Write as _;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::outcome::{CycleFailure, DownloadOutcome, ObservationSink};

/// Default flush interval (one hour).
pub const DEFAULT_SUMMARY_INTERVAL: Duration = Duration::from_secs(3600);

/// URLs downloaded successfully during one flush window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Length of the window the summary covers.
    pub window: Duration,
    /// Downloaded URLs in completion order.
    pub urls: Vec<Url>,
}

impl DownloadSummary {
    /// Returns the number of files in the summary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Returns true if nothing was downloaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Renders the summary as a multi-line record.
    ///
    /// ```
    /// use std::time::Duration;
    /// use changelog_mirror::DownloadSummary;
    /// use url::Url;
    ///
    /// let summary = DownloadSummary {
    ///     window: Duration::from_secs(3600),
    ///     urls: vec![Url::parse("https://example.com/a.docx").unwrap()],
    /// };
    /// assert_eq!(
    ///     summary.render(),
    ///     "Downloaded files in the last hour:\n\nhttps://example.com/a.docx\n"
    /// );
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut msg = format!("Downloaded files in {}:\n\n", describe_window(self.window));
        for url in &self.urls {
            let _ = writeln!(msg, "{url}");
        }
        msg
    }
}

/// Human phrase for a flush window, e.g. "the last hour".
fn describe_window(window: Duration) -> String {
    let secs = window.as_secs();
    match secs {
        3600 => "the last hour".to_string(),
        60 => "the last minute".to_string(),
        s if s > 0 && s % 3600 == 0 => format!("the last {} hours", s / 3600),
        s if s > 0 && s % 60 == 0 => format!("the last {} minutes", s / 60),
        s => format!("the last {s} seconds"),
    }
}

/// Sink adapter buffering successful outcomes for periodic flushing.
#[derive(Debug)]
pub struct SummaryAggregator {
    inner: Arc<dyn ObservationSink>,
    window: Duration,
    buffer: Mutex<Vec<Url>>,
}

impl SummaryAggregator {
    /// Wraps `inner`; summaries are labelled with `window`.
    #[must_use]
    pub fn new(inner: Arc<dyn ObservationSink>, window: Duration) -> Self {
        Self {
            inner,
            window,
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Returns how many successes are waiting for the next flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Emits everything buffered as one summary.
    ///
    /// Returns the summary, or `None` when the buffer was empty (nothing is
    /// reported in that case).
    pub fn flush(&self) -> Option<DownloadSummary> {
        let urls = mem::take(&mut *self.lock());
        if urls.is_empty() {
            return None;
        }
        let summary = DownloadSummary {
            window: self.window,
            urls,
        };
        self.inner.report_summary(&summary);
        Some(summary)
    }

    /// Flushes every `window` until `halt` is cancelled, then flushes once more.
    #[instrument(skip_all, fields(window_secs = self.window.as_secs()))]
    pub async fn run_flush_loop(self: Arc<Self>, halt: CancellationToken) {
        let mut ticker = tokio::time::interval(self.window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = halt.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(summary) = self.flush() {
                        debug!(files = summary.len(), "flushed download summary");
                    }
                }
            }
        }

        if let Some(summary) = self.flush() {
            debug!(files = summary.len(), "flushed final download summary");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Url>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObservationSink for SummaryAggregator {
    fn report_outcome(&self, outcome: &DownloadOutcome) {
        if outcome.success {
            self.lock().push(outcome.url.clone());
        } else {
            self.inner.report_outcome(outcome);
        }
    }

    fn report_error(&self, failure: &CycleFailure) {
        self.inner.report_error(failure);
    }

    fn report_summary(&self, summary: &DownloadSummary) {
        self.inner.report_summary(summary);
    }
}
