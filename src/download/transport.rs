//! Transport abstraction and the HTTP implementation.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::DownloadError;
use crate::credentials::Credentials;
use crate::http::{HttpTimeouts, build_client};

/// Fetches one URL into a destination file.
///
/// Per-download timeouts are the transport's responsibility and surface as
/// [`DownloadError::Timeout`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Downloads `url` into `destination`, overwriting it. Returns bytes written.
    async fn download(&self, url: &Url, destination: &Path) -> Result<u64, DownloadError>;
}

/// HTTP transport with streaming writes.
///
/// Created once and shared by all workers so connections are pooled.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    /// Creates a transport with the given timeouts and optional credentials.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the client cannot be built (for
    /// example when no TLS backend can be initialised).
    pub fn new(
        timeouts: HttpTimeouts,
        credentials: Option<Credentials>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(timeouts)?,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, destination), fields(url = %url))]
    async fn download(&self, url: &Url, destination: &Path) -> Result<u64, DownloadError> {
        let mut request = self.client.get(url.clone());
        if let Some(credentials) = &self.credentials {
            request = credentials.apply(request);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }

        let mut file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        let bytes = stream_to_file(&mut file, response, url, destination).await?;

        debug!(bytes, path = %destination.display(), "response body written");
        Ok(bytes)
    }
}

/// Streams a response body to `file`, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &Url,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url.as_str(), e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
