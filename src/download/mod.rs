//! Downloading queued URLs.
//!
//! This module provides the transport seam, the HTTP transport and the pool
//! of workers that drains the [`DedupQueue`](crate::queue::DedupQueue).
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Scoped temporary destinations, deleted on every exit path
//! - Panics inside a transport are contained and reported as failures
//!
//! # Example
//!
//! ```no_run
//! use changelog_mirror::download::{HttpTransport, TempDestination, Transport};
//! use changelog_mirror::HttpTimeouts;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(HttpTimeouts::default(), None)?;
//! let destination = TempDestination::acquire(&std::env::temp_dir())?;
//! let url = Url::parse("https://example.com/report.docx")?;
//! let bytes = transport.download(&url, destination.path()).await?;
//! println!("fetched {bytes} bytes");
//! destination.release()?;
//! # Ok(())
//! # }
//! ```

mod error;
mod temp;
mod transport;
mod worker;

pub use error::DownloadError;
pub use temp::TempDestination;
pub use transport::{HttpTransport, Transport};
pub use worker::{DEFAULT_CONCURRENCY, DownloadStats, MAX_CONCURRENCY, WorkerPool};

pub(crate) use worker::WorkerContext;

// Note: no module-local Result alias; use `Result<T, DownloadError>` explicitly.
