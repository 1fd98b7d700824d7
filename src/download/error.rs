//! Error types for the download module.
//!
//! None of these errors stop a worker; each one is turned into a failed
//! [`DownloadOutcome`](crate::outcome::DownloadOutcome) and the worker moves on
//! to the next URL.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while downloading one file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the temporary destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The temporary destination could not be created.
    #[error("could not create temporary file in {dir}: {source}")]
    TempFile {
        /// Directory the temporary file was requested in.
        dir: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The transport panicked while downloading.
    #[error("download of {url} panicked: {message}")]
    Panicked {
        /// The URL being downloaded.
        url: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

impl DownloadError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a temporary-file error.
    pub fn temp_file(dir: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::TempFile {
            dir: dir.into(),
            source,
        }
    }

    /// Creates a panic error from a caught panic payload.
    pub fn panicked(url: impl Into<String>, payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panicked {
            url: url.into(),
            message,
        }
    }
}

// Note: no `From<reqwest::Error>` / `From<std::io::Error>`; every variant
// needs the URL or path the source error does not carry.
