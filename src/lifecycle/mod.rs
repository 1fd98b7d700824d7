//! Start / pause / stop control over the poller and the worker pool.
//!
//! [`Mirror`] owns every task of a running mirror. It is the only component
//! that drains the queue and the only one that spawns or joins tasks.
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --start--> Running
//!   \                |                  |
//!    +------stop-----+-------stop-------+----> Stopped (terminal)
//! ```
//!
//! `stop` never blocks: the queue starts draining and the poll loop is told to
//! halt. Use [`Mirror::wait`] (or [`Mirror::shutdown`]) to wait until every
//! queued item has been served and the final summary was flushed.

mod state;

pub use state::{LifecycleError, LifecycleState};

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::{
    DEFAULT_CONCURRENCY, DownloadStats, MAX_CONCURRENCY, Transport, WorkerContext, WorkerPool,
};
use crate::outcome::ObservationSink;
use crate::poll::Poller;
use crate::queue::DedupQueue;
use crate::source::ChangeSource;
use crate::summary::{DEFAULT_SUMMARY_INTERVAL, SummaryAggregator};

/// Default time between poll cycles.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Runtime settings of a [`Mirror`]; read-only once the mirror is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSettings {
    /// Number of download workers (0 = poll only).
    pub concurrency: usize,
    /// Pause between the end of one poll cycle and the start of the next.
    pub refresh_interval: Duration,
    /// Window of the download summary in normal mode.
    pub summary_interval: Duration,
    /// Directory for temporary download files; the system temp dir if unset.
    pub temp_dir: Option<PathBuf>,
    /// Log every query and download individually instead of summarising.
    pub debug_mode: bool,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            summary_interval: DEFAULT_SUMMARY_INTERVAL,
            temp_dir: None,
            debug_mode: false,
        }
    }
}

impl MirrorSettings {
    /// Checks the settings.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidConcurrency`] above [`MAX_CONCURRENCY`]
    /// workers and [`LifecycleError::InvalidInterval`] for a zero interval.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.concurrency > MAX_CONCURRENCY {
            return Err(LifecycleError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(LifecycleError::InvalidInterval {
                name: "refresh_interval",
            });
        }
        if self.summary_interval.is_zero() {
            return Err(LifecycleError::InvalidInterval {
                name: "summary_interval",
            });
        }
        Ok(())
    }

    fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Where the poller currently lives.
enum Polling {
    /// Not running; owned by the controller.
    Parked(Poller),
    /// Running on its own task until `halt` is cancelled.
    Armed {
        task: JoinHandle<Poller>,
        halt: CancellationToken,
    },
    /// The poll task ended abnormally and the poller is gone.
    Lost,
}

/// Lifecycle controller of one change-log mirror.
pub struct Mirror {
    settings: MirrorSettings,
    state: LifecycleState,
    queue: Arc<DedupQueue>,
    transport: Arc<dyn Transport>,
    /// Sink handed to the poller and the workers.
    sink: Arc<dyn ObservationSink>,
    aggregator: Option<Arc<SummaryAggregator>>,
    polling: Polling,
    workers: Option<WorkerPool>,
    summary_task: Option<JoinHandle<()>>,
    summary_halt: CancellationToken,
    abort: CancellationToken,
    stats: Arc<DownloadStats>,
    watermark: watch::Receiver<Option<DateTime<Utc>>>,
}

impl fmt::Debug for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mirror")
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("queue", &self.queue)
            .field("cursor", &self.cursor())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Mirror {
    /// Builds an idle mirror.
    ///
    /// In normal mode successful downloads reach `sink` as periodic
    /// summaries; in debug mode they are reported one by one.
    ///
    /// # Errors
    ///
    /// Returns an error if `settings` fail [`MirrorSettings::validate`].
    pub fn new(
        settings: MirrorSettings,
        source: Arc<dyn ChangeSource>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ObservationSink>,
    ) -> Result<Self, LifecycleError> {
        settings.validate()?;

        let queue = Arc::new(DedupQueue::new());
        let (sink, aggregator) = if settings.debug_mode {
            (sink, None)
        } else {
            let aggregator = Arc::new(SummaryAggregator::new(sink, settings.summary_interval));
            (
                Arc::clone(&aggregator) as Arc<dyn ObservationSink>,
                Some(aggregator),
            )
        };
        let poller = Poller::new(source, Arc::clone(&queue), Arc::clone(&sink))
            .verbose(settings.debug_mode);
        let watermark = poller.subscribe();

        Ok(Self {
            settings,
            state: LifecycleState::Idle,
            queue,
            transport,
            sink,
            aggregator,
            polling: Polling::Parked(poller),
            workers: None,
            summary_task: None,
            summary_halt: CancellationToken::new(),
            abort: CancellationToken::new(),
            stats: Arc::new(DownloadStats::new()),
            watermark,
        })
    }

    /// Starts or resumes the mirror.
    ///
    /// The first start runs one poll cycle before any worker exists, then
    /// spawns the workers and arms the poll loop. Starting a paused mirror
    /// only re-arms the poll loop; starting a running one does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStopped`] after [`stop`](Self::stop)
    /// and [`LifecycleError::PollerLost`] if the first cycle or a previous
    /// poll task panicked. A mirror whose first cycle panicked stays idle.
    #[instrument(skip(self), fields(state = %self.state))]
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Stopped => Err(LifecycleError::AlreadyStopped),
            LifecycleState::Running => {
                debug!("mirror already running");
                Ok(())
            }
            LifecycleState::Paused => {
                self.arm_poll_loop()?;
                self.state = LifecycleState::Running;
                info!("Mirror resumed");
                Ok(())
            }
            LifecycleState::Idle => {
                self.run_first_cycle().await?;
                self.spawn_workers();
                self.spawn_summary_loop();
                self.arm_poll_loop()?;
                self.state = LifecycleState::Running;
                info!(
                    workers = self.settings.concurrency,
                    interval_ms = self.settings.refresh_interval.as_millis(),
                    "Mirror started"
                );
                Ok(())
            }
        }
    }

    /// Stops polling; workers keep serving what is already queued.
    ///
    /// Waits for a poll cycle in progress to finish. Pausing an idle or
    /// paused mirror does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStopped`] after [`stop`](Self::stop).
    #[instrument(skip(self), fields(state = %self.state))]
    pub async fn pause(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            LifecycleState::Stopped => Err(LifecycleError::AlreadyStopped),
            LifecycleState::Idle | LifecycleState::Paused => {
                debug!("mirror not running, nothing to pause");
                Ok(())
            }
            LifecycleState::Running => {
                self.disarm_poll_loop().await;
                self.state = LifecycleState::Paused;
                info!("Mirror paused");
                Ok(())
            }
        }
    }

    /// Stops the mirror without waiting.
    ///
    /// The poll loop is told to halt and the queue starts draining: nothing
    /// new is accepted, queued items are still served, and workers exit once
    /// the queue is empty. Idempotent.
    pub fn stop(&mut self) {
        if self.state == LifecycleState::Stopped {
            return;
        }
        if let Polling::Armed { halt, .. } = &self.polling {
            halt.cancel();
        }
        self.queue.drain();
        let previous = self.state;
        self.state = LifecycleState::Stopped;
        info!(from = %previous, pending = self.queue.len(), "Mirror stopping");
    }

    /// Stops the mirror and makes workers exit after their current download,
    /// leaving queued items unprocessed.
    pub fn abort(&mut self) {
        self.abort.cancel();
        self.stop();
    }

    /// Waits until every task of a stopped mirror has exited.
    ///
    /// Joins the poll loop and the workers, then flushes the final download
    /// summary.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotStopped`] unless [`stop`](Self::stop) or
    /// [`abort`](Self::abort) was called first.
    pub async fn wait(&mut self) -> Result<(), LifecycleError> {
        if self.state != LifecycleState::Stopped {
            return Err(LifecycleError::NotStopped { state: self.state });
        }

        self.disarm_poll_loop().await;
        if let Some(workers) = self.workers.take() {
            workers.join().await;
        }

        self.summary_halt.cancel();
        if let Some(task) = self.summary_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "summary task ended abnormally");
            }
        } else if let Some(aggregator) = &self.aggregator {
            aggregator.flush();
        }

        info!(
            completed = self.stats.completed(),
            failed = self.stats.failed(),
            left_unprocessed = self.queue.len() + self.stats.abandoned(),
            "Mirror stopped"
        );
        Ok(())
    }

    /// [`stop`](Self::stop) followed by [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// Never fails in practice; the `Result` mirrors [`wait`](Self::wait).
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        self.stop();
        self.wait().await
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the settings the mirror was built with.
    #[must_use]
    pub fn settings(&self) -> &MirrorSettings {
        &self.settings
    }

    /// Returns the pending-work queue.
    #[must_use]
    pub fn queue(&self) -> &Arc<DedupQueue> {
        &self.queue
    }

    /// Returns the poller's watermark as of its last completed cycle.
    #[must_use]
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        *self.watermark.borrow()
    }

    /// Returns the download counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<DownloadStats> {
        &self.stats
    }

    fn spawn_workers(&mut self) {
        let ctx = WorkerContext {
            queue: Arc::clone(&self.queue),
            transport: Arc::clone(&self.transport),
            sink: Arc::clone(&self.sink),
            temp_dir: self.settings.resolved_temp_dir(),
            verbose: self.settings.debug_mode,
            abort: self.abort.clone(),
            stats: Arc::clone(&self.stats),
        };
        self.workers = Some(WorkerPool::spawn(self.settings.concurrency, ctx));
    }

    fn spawn_summary_loop(&mut self) {
        if let Some(aggregator) = &self.aggregator {
            let task = tokio::spawn(
                Arc::clone(aggregator).run_flush_loop(self.summary_halt.clone()),
            );
            self.summary_task = Some(task);
        }
    }

    async fn run_first_cycle(&mut self) -> Result<(), LifecycleError> {
        let Polling::Parked(poller) = &mut self.polling else {
            return Err(LifecycleError::PollerLost);
        };
        let cycle = AssertUnwindSafe(poller.poll_once()).catch_unwind().await;
        if cycle.is_err() {
            warn!("first poll cycle panicked");
            self.polling = Polling::Lost;
            return Err(LifecycleError::PollerLost);
        }
        Ok(())
    }

    fn arm_poll_loop(&mut self) -> Result<(), LifecycleError> {
        match std::mem::replace(&mut self.polling, Polling::Lost) {
            Polling::Parked(poller) => {
                let halt = CancellationToken::new();
                let task = tokio::spawn(poller.run(self.settings.refresh_interval, halt.clone()));
                self.polling = Polling::Armed { task, halt };
                Ok(())
            }
            armed @ Polling::Armed { .. } => {
                self.polling = armed;
                Ok(())
            }
            Polling::Lost => Err(LifecycleError::PollerLost),
        }
    }

    async fn disarm_poll_loop(&mut self) {
        match std::mem::replace(&mut self.polling, Polling::Lost) {
            Polling::Armed { task, halt } => {
                halt.cancel();
                match task.await {
                    Ok(poller) => self.polling = Polling::Parked(poller),
                    Err(e) => warn!(error = %e, "poll task ended abnormally"),
                }
            }
            other => self.polling = other,
        }
    }
}

impl Drop for Mirror {
    fn drop(&mut self) {
        if let Polling::Armed { halt, .. } = &self.polling {
            halt.cancel();
        }
        self.queue.drain();
        self.summary_halt.cancel();
    }
}
