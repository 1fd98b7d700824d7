//! Error types for change source queries and entries.

use thiserror::Error;

/// Errors that abort a whole poll cycle.
///
/// The cursor is left untouched and the query is retried on the next tick.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error querying {endpoint}: {source}")]
    Network {
        /// The endpoint that was queried.
        endpoint: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The query timed out before the change source answered.
    #[error("timeout querying {endpoint}")]
    Timeout {
        /// The endpoint that timed out.
        endpoint: String,
    },

    /// The change source answered with an error status.
    #[error("HTTP {status} querying {endpoint}")]
    HttpStatus {
        /// The endpoint that returned an error status.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded as a change log page.
    #[error("malformed response from {endpoint}: {message}")]
    Decode {
        /// The endpoint whose response failed to decode.
        endpoint: String,
        /// Decoder error text.
        message: String,
    },

    /// The query itself could not be constructed.
    #[error("invalid query: {message}")]
    InvalidRequest {
        /// Why the query is invalid.
        message: String,
    },

    /// The change source is unavailable for a reason other than transport.
    #[error("change source unavailable: {message}")]
    Unavailable {
        /// Human-readable cause.
        message: String,
    },
}

impl QueryError {
    /// Creates a network or timeout error from a reqwest error.
    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Network { endpoint, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns a short stable label for structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Timeout { .. } => "timeout",
            Self::HttpStatus { .. } => "http_status",
            Self::Decode { .. } => "decode",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Unavailable { .. } => "unavailable",
        }
    }
}

/// Reasons a single change entry is skipped. Never fails the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEntry {
    /// The entry carries no creation timestamp.
    #[error("entry has no creation time")]
    MissingCreated,

    /// The entry carries no URL.
    #[error("entry has no URL")]
    MissingUrl,

    /// The URL is not an absolute URI.
    #[error("entry URL is not absolute: {url}")]
    InvalidUrl {
        /// The rejected URL text.
        url: String,
    },
}
