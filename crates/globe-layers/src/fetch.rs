//! Capabilities document retrieval.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::ResolutionConfig;

/// Failure while retrieving a capabilities document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout, or protocol failure.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Retrieves capabilities documents by URL.
///
/// The resolution pipeline only depends on this trait, so tests can swap in
/// a canned implementation without a live server.
#[async_trait]
pub trait CapabilitiesFetcher: Send + Sync {
    /// Fetch the document at `url` and return its raw bytes.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// HTTP fetcher with explicit connect and read timeouts.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ResolutionConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.fetch_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }
}

#[async_trait]
impl CapabilitiesFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!(url = %url, "Requesting capabilities document");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        debug!(url = %url, size = body.len(), "Received capabilities document");
        Ok(body)
    }
}
