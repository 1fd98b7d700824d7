//! Observation sink trait and its stock implementations.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{CycleFailure, DownloadOutcome, MirrorEvent};
use crate::summary::DownloadSummary;

/// Receiver of everything the mirror wants to tell its host.
///
/// Calls happen on worker and poller tasks, so implementations must be cheap
/// and must not block.
pub trait ObservationSink: Send + Sync + fmt::Debug {
    /// Reports the result of one download attempt.
    fn report_outcome(&self, outcome: &DownloadOutcome);

    /// Reports a poll cycle that aborted on a query failure.
    fn report_error(&self, failure: &CycleFailure);

    /// Reports a flushed batch of successful downloads.
    fn report_summary(&self, summary: &DownloadSummary) {
        let _ = summary;
    }
}

/// Sink writing structured `tracing` records.
///
/// In verbose mode every successful download is logged at `info`; otherwise
/// successes are only visible at `debug` and are expected to reach the host
/// through a [`SummaryAggregator`](crate::summary::SummaryAggregator).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    verbose: bool,
}

impl TracingSink {
    /// Creates a sink; `verbose` logs every success individually.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ObservationSink for TracingSink {
    fn report_outcome(&self, outcome: &DownloadOutcome) {
        if outcome.success {
            if self.verbose {
                info!(url = %outcome.url, bytes = outcome.bytes, "Downloaded");
            } else {
                debug!(url = %outcome.url, bytes = outcome.bytes, "Downloaded");
            }
        } else {
            warn!(
                url = %outcome.url,
                error = outcome.error.as_deref().unwrap_or("unknown error"),
                "download failed"
            );
        }
    }

    fn report_error(&self, failure: &CycleFailure) {
        error!(
            since = ?failure.since,
            kind = failure.error.kind(),
            error = %failure.error,
            "change log query failed"
        );
    }

    fn report_summary(&self, summary: &DownloadSummary) {
        if summary.is_empty() {
            return;
        }
        info!(files = summary.len(), "{}", summary.render());
    }
}

/// Sink forwarding every report as a [`MirrorEvent`] on an unbounded channel.
///
/// Reports made after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<MirrorEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiving end of its event stream.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MirrorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: MirrorEvent) {
        if self.tx.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

impl ObservationSink for ChannelSink {
    fn report_outcome(&self, outcome: &DownloadOutcome) {
        self.send(MirrorEvent::Download(outcome.clone()));
    }

    fn report_error(&self, failure: &CycleFailure) {
        self.send(MirrorEvent::CycleFailed(failure.clone()));
    }

    fn report_summary(&self, summary: &DownloadSummary) {
        self.send(MirrorEvent::Summary(summary.clone()));
    }
}

/// Sink delivering every report to each inner sink in order.
#[derive(Debug, Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ObservationSink>>,
}

impl FanoutSink {
    /// Creates a fan-out over `sinks`.
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn ObservationSink>>) -> Self {
        Self { sinks }
    }

    /// Adds another sink.
    #[must_use]
    pub fn with(mut self, sink: Arc<dyn ObservationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ObservationSink for FanoutSink {
    fn report_outcome(&self, outcome: &DownloadOutcome) {
        for sink in &self.sinks {
            sink.report_outcome(outcome);
        }
    }

    fn report_error(&self, failure: &CycleFailure) {
        for sink in &self.sinks {
            sink.report_error(failure);
        }
    }

    fn report_summary(&self, summary: &DownloadSummary) {
        for sink in &self.sinks {
            sink.report_summary(summary);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use super::*;
    use crate::source::QueryError;

    fn outcome() -> DownloadOutcome {
        DownloadOutcome::succeeded(Url::parse("https://example.com/a").unwrap(), 3)
    }

    #[test]
    fn test_channel_sink_forwards_events_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.report_outcome(&outcome());
        sink.report_error(&CycleFailure::new(None, QueryError::unavailable("down")));

        assert!(matches!(rx.try_recv().unwrap(), MirrorEvent::Download(o) if o.success));
        assert!(matches!(rx.try_recv().unwrap(), MirrorEvent::CycleFailed(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.report_outcome(&outcome());
    }

    #[test]
    fn test_fanout_delivers_to_every_sink() {
        let (first, mut first_rx) = ChannelSink::new();
        let (second, mut second_rx) = ChannelSink::new();
        let fanout = FanoutSink::default()
            .with(Arc::new(first))
            .with(Arc::new(second))
            .with(Arc::new(TracingSink::new(true)));

        fanout.report_outcome(&outcome());

        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_ok());
    }
}
