//! Shared fakes for the integration tests: a scripted transport and event helpers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use changelog_mirror::{DownloadError, DownloadOutcome, MirrorEvent, Transport};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::{Semaphore, mpsc};
use url::Url;

/// Timestamp on a fixed test day.
pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0)
        .single()
        .expect("valid test timestamp")
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).expect("valid test url")
}

/// Transport that writes the URL into the destination.
///
/// URLs whose path contains `fail` get a 503. When built with
/// [`RecordingTransport::gated`], each download waits for a permit released
/// through [`RecordingTransport::release`].
#[derive(Debug, Default)]
pub struct RecordingTransport {
    destinations: Mutex<Vec<PathBuf>>,
    started: Mutex<Vec<Url>>,
    gate: Option<Semaphore>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Lets `count` more gated downloads finish.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Temporary paths handed to the transport, in call order.
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.destinations.lock().expect("lock").clone()
    }

    /// URLs whose download started, in call order.
    pub fn started(&self) -> Vec<Url> {
        self.started.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn download(&self, url: &Url, destination: &Path) -> Result<u64, DownloadError> {
        self.started.lock().expect("lock").push(url.clone());
        self.destinations
            .lock()
            .expect("lock")
            .push(destination.to_path_buf());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }

        if url.path().contains("fail") {
            return Err(DownloadError::http_status(url.as_str(), 503));
        }
        let body = url.as_str().as_bytes();
        tokio::fs::write(destination, body)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        Ok(body.len() as u64)
    }
}

/// Drains every event received so far.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<MirrorEvent>) -> Vec<MirrorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Download outcomes among `events`, in order.
pub fn downloads(events: &[MirrorEvent]) -> Vec<DownloadOutcome> {
    events
        .iter()
        .filter_map(|event| match event {
            MirrorEvent::Download(outcome) => Some(outcome.clone()),
            _ => None,
        })
        .collect()
}

/// Polls `condition` every 10ms until it holds or 5 seconds pass.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
