//! Cancellation-aware HTTP fetcher.
//!
//! A fixed User-Agent, a configurable timeout, and any non-200 status is
//! treated as a fetch error.

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::select;
use tokio_util::sync::CancellationToken;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; webmirror/0.1; +offline-mirror)";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request { url: String, #[source] source: reqwest::Error },
    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },
    #[error("fetch of {url} was cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// Whether retrying is worth attempting: connection/transport failures
    /// and server errors (5xx) are, client errors (4xx) and cancellation
    /// are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request { .. } => true,
            FetchError::Status { status, .. } => status.is_server_error(),
            FetchError::Cancelled { .. } => false,
        }
    }
}

/// Thin wrapper over a shared `reqwest::Client`. Cloning is cheap: `reqwest`
/// clients are internally `Arc`-backed connection pools, so one `Fetcher` is
/// built once and shared across every fetch-stage worker.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(timeout: std::time::Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Fetches `url`'s body as bytes, racing the request against `cancel`.
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, FetchError> {
        let request = self.client.get(url).send();

        let response = select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled { url: url.to_string() }),
            result = request => result.map_err(|source| FetchError::Request { url: url.to_string(), source })?,
        };

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status { url: url.to_string(), status: response.status() });
        }

        let bytes = select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled { url: url.to_string() }),
            result = response.bytes() => result.map_err(|source| FetchError::Request { url: url.to_string(), source })?,
        };

        Ok(bytes.to_vec())
    }
}
