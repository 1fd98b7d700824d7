//! Change Log Mirror Library
//!
//! This library mirrors files referenced by an append-only remote change log
//! to local storage. A poller incrementally queries the change source for
//! entries newer than its cursor, a deduplicating queue holds the pending
//! URLs, and a fixed pool of workers downloads each one to a scoped
//! temporary location.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`queue`] - Deduplicating work queue with a one-way drain transition
//! - [`source`] - Change source abstraction and the `SharePoint` list adapter
//! - [`poll`] - Cursor and incremental polling cycles
//! - [`download`] - Transport abstraction, HTTP transport and the worker pool
//! - [`outcome`] - Download outcomes, cycle failures and observation sinks
//! - [`summary`] - Batching aggregator for successful downloads
//! - [`lifecycle`] - Start / pause / stop controller tying everything together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod credentials;
pub mod download;
mod http;
pub mod lifecycle;
pub mod outcome;
pub mod poll;
pub mod queue;
pub mod source;
pub mod summary;

// Re-export commonly used types
pub use credentials::Credentials;
pub use download::{
    DEFAULT_CONCURRENCY, DownloadError, DownloadStats, HttpTransport, MAX_CONCURRENCY,
    TempDestination, Transport, WorkerPool,
};
pub use http::HttpTimeouts;
pub use lifecycle::{
    DEFAULT_REFRESH_INTERVAL, LifecycleError, LifecycleState, Mirror, MirrorSettings,
};
pub use outcome::{
    ChannelSink, CycleFailure, DownloadOutcome, FanoutSink, MirrorEvent, ObservationSink,
    TracingSink,
};
pub use poll::{Cursor, CycleReport, Poller};
pub use queue::{Admission, DedupQueue, QueueState};
pub use source::{
    ChangeEntry, ChangeSource, MalformedEntry, MemoryChangeSource, QueryError, RawChangeEntry,
    SharePointListSource,
};
pub use summary::{DEFAULT_SUMMARY_INTERVAL, DownloadSummary, SummaryAggregator};
