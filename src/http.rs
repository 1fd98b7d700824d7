//! Shared HTTP client construction for the change source and the transport.

use std::time::Duration;

use reqwest::Client;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Connect and overall request timeouts for an HTTP client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Seconds allowed to establish a connection.
    pub connect_secs: u64,
    /// Seconds allowed for a whole request, body included.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// User-Agent sent with change log queries and downloads.
pub(crate) fn user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("changelog-mirror/{version}")
}

pub(crate) fn build_client(timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.read_secs))
        .gzip(true)
        .user_agent(user_agent())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = HttpTimeouts::default();
        assert_eq!(timeouts.connect_secs, 30);
        assert_eq!(timeouts.read_secs, 300);
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(user_agent().starts_with("changelog-mirror/"));
        assert!(user_agent().contains(env!("CARGO_PKG_VERSION")));
    }
}
