//! Observable results of the mirror: per-download outcomes, failed poll
//! cycles and batched summaries.
//!
//! Components never log failures through a global; they report to an
//! [`ObservationSink`] injected at construction. Hosts pick or combine sinks:
//!
//! - [`TracingSink`] - structured `tracing` records
//! - [`ChannelSink`] - forwards [`MirrorEvent`]s to an async channel
//! - [`FanoutSink`] - delivers every event to several sinks
//! - [`SummaryAggregator`](crate::summary::SummaryAggregator) - batches successes

mod sink;

pub use sink::{ChannelSink, FanoutSink, ObservationSink, TracingSink};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::download::DownloadError;
use crate::source::QueryError;
use crate::summary::DownloadSummary;

/// Result of one download attempt, emitted by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The URL that was downloaded.
    pub url: Url,
    /// Whether the file was fetched completely.
    pub success: bool,
    /// Bytes written to the temporary destination (0 on failure).
    pub bytes: u64,
    /// Failure description when `success` is false.
    pub error: Option<String>,
}

impl DownloadOutcome {
    /// Creates a success outcome.
    #[must_use]
    pub fn succeeded(url: Url, bytes: u64) -> Self {
        Self {
            url,
            success: true,
            bytes,
            error: None,
        }
    }

    /// Creates a failure outcome from a download error.
    #[must_use]
    pub fn failed(url: Url, error: &DownloadError) -> Self {
        Self {
            url,
            success: false,
            bytes: 0,
            error: Some(error.to_string()),
        }
    }
}

/// A poll cycle aborted because the change source query failed.
#[derive(Debug, Clone)]
pub struct CycleFailure {
    /// Cursor value the failed query used.
    pub since: Option<DateTime<Utc>>,
    /// When the failure was observed.
    pub at: DateTime<Utc>,
    /// The query error.
    pub error: Arc<QueryError>,
}

impl CycleFailure {
    /// Wraps a query error observed now.
    #[must_use]
    pub fn new(since: Option<DateTime<Utc>>, error: QueryError) -> Self {
        Self {
            since,
            at: Utc::now(),
            error: Arc::new(error),
        }
    }
}

/// Event stream item delivered by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    /// A worker finished one download attempt.
    Download(DownloadOutcome),
    /// A poll cycle failed.
    CycleFailed(CycleFailure),
    /// A batch of successful downloads was flushed.
    Summary(DownloadSummary),
}
