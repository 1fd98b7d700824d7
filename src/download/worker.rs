//! Download workers.
//!
//! Each worker loops on [`DedupQueue::take`], downloads the URL into a
//! [`TempDestination`], releases the destination and reports a
//! [`DownloadOutcome`]. A failed download never ends the loop; a worker exits
//! only when the queue is closed or an abort was requested.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use super::{DownloadError, TempDestination, Transport};
use crate::outcome::{DownloadOutcome, ObservationSink};
use crate::queue::DedupQueue;

/// Maximum allowed worker count.
pub const MAX_CONCURRENCY: usize = 100;

/// Default worker count.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Download counters shared by all workers of a pool.
///
/// Uses atomic counters for thread-safe updates from concurrent workers.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    abandoned: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of items taken from the queue but left
    /// unprocessed because of an abort.
    #[must_use]
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Returns the total number of items processed (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.failed()
    }

    fn record(&self, outcome: &DownloadOutcome) {
        if outcome.success {
            self.completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Everything a worker needs, shared by the whole pool.
pub(crate) struct WorkerContext {
    pub(crate) queue: Arc<DedupQueue>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) sink: Arc<dyn ObservationSink>,
    pub(crate) temp_dir: PathBuf,
    pub(crate) verbose: bool,
    /// Cancelled to make workers leave remaining items unprocessed.
    pub(crate) abort: CancellationToken,
    pub(crate) stats: Arc<DownloadStats>,
}

/// A fixed set of running download workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    stats: Arc<DownloadStats>,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl WorkerPool {
    /// Spawns `count` workers on the current runtime. `count` may be zero.
    pub(crate) fn spawn(count: usize, ctx: WorkerContext) -> Self {
        let stats = Arc::clone(&ctx.stats);
        let ctx = Arc::new(ctx);
        let handles = (0..count)
            .map(|id| tokio::spawn(run_worker(id, Arc::clone(&ctx))))
            .collect();
        debug!(workers = count, "worker pool started");
        Self { handles, stats }
    }

    /// Returns the number of workers in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true for a pool without workers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns true once every worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(JoinHandle::is_finished)
    }

    /// Returns the pool's download counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<DownloadStats> {
        &self.stats
    }

    /// Waits for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            // Workers contain download panics themselves; a JoinError here
            // means the runtime is shutting down.
            if let Err(e) = handle.await {
                warn!(error = %e, "download worker ended abnormally");
            }
        }
    }
}

async fn run_worker(id: usize, ctx: Arc<WorkerContext>) {
    debug!(worker = id, "worker started");

    loop {
        // `take` is cancel-safe: losing the race to `abort` leaves every
        // pending item in the queue.
        let url = tokio::select! {
            biased;
            () = ctx.abort.cancelled() => {
                debug!(worker = id, left = ctx.queue.len(), "abort requested, leaving queue unprocessed");
                break;
            }
            next = ctx.queue.take() => match next {
                Some(url) => url,
                None => break,
            },
        };
        if ctx.abort.is_cancelled() {
            debug!(worker = id, url = %url, "abort requested, leaving item unprocessed");
            ctx.stats.abandoned.fetch_add(1, Ordering::SeqCst);
            break;
        }

        let outcome = download_one(&ctx, &url).await;
        ctx.stats.record(&outcome);
        ctx.sink.report_outcome(&outcome);
    }

    debug!(worker = id, "worker exiting");
}

/// Downloads one URL into a scoped temporary file and releases it.
#[instrument(skip(ctx), fields(url = %url))]
async fn download_one(ctx: &WorkerContext, url: &Url) -> DownloadOutcome {
    let destination = match TempDestination::acquire(&ctx.temp_dir) {
        Ok(destination) => destination,
        Err(e) => return DownloadOutcome::failed(url.clone(), &e),
    };

    if ctx.verbose {
        info!(url = %url, "Downloading");
    }

    let result = AssertUnwindSafe(ctx.transport.download(url, destination.path()))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(DownloadError::panicked(url.as_str(), payload.as_ref())));

    match destination.release() {
        Ok(path) => trace!(path = %path.display(), "temporary file released"),
        Err(e) => warn!(error = %e, "failed to remove temporary file"),
    }

    match result {
        Ok(bytes) => DownloadOutcome::succeeded(url.clone(), bytes),
        Err(e) => DownloadOutcome::failed(url.clone(), &e),
    }
}
