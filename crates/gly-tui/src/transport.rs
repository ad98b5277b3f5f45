//! Transport adapter for catalog/metadata JSON fetches and streamed file bodies.
//!
//! `Transport` is the seam the core and the download workers talk to;
//! `HttpTransport` is the reqwest implementation used at runtime.

use std::future::Future;
use std::time::Duration;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use gly_proto::catalog::{parse_catalog, Episode};
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// A response body delivered chunk by chunk.
pub struct ByteStream {
    /// `Content-Length`, when the server sent a non-zero one.
    pub total_len: Option<u64>,
    pub chunks: BoxStream<'static, Result<Vec<u8>, TransportError>>,
}

pub trait Transport: Send + Sync + 'static {
    fn fetch_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Open a streamed GET.  Resolves once response headers arrived.
    fn stream_download(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<ByteStream, TransportError>> + Send;
}

/// Fetch and parse the episode catalog.
pub async fn fetch_catalog<T: Transport>(
    transport: &T,
    url: &str,
    timeout: Duration,
) -> Result<Vec<Episode>, TransportError> {
    let doc = transport
        .fetch_json(url, &[("Accept", "application/json")], timeout)
        .await?;
    let episodes = parse_catalog(&doc);
    info!("catalog: {} episodes from {}", episodes.len(), url);
    Ok(episodes)
}

// ── reqwest implementation ────────────────────────────────────────────────────

pub struct HttpTransport {
    client: reqwest::Client,
    header_timeout: Duration,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("gly/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            header_timeout: connect_timeout,
        })
    }
}

impl Transport for HttpTransport {
    async fn fetch_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        debug!("transport: GET {}", url);
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }

    async fn stream_download(&self, url: &str) -> Result<ByteStream, TransportError> {
        debug!("transport: streaming GET {}", url);
        // No whole-request timeout here: bodies are large.  The header wait is
        // bounded, and the worker bounds every chunk read.
        let response = tokio::time::timeout(self.header_timeout, self.client.get(url).send())
            .await
            .map_err(|_| TransportError::Timeout)??;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        let total_len = response.content_length().filter(|len| *len > 0);
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TransportError::from))
            .boxed();
        Ok(ByteStream { total_len, chunks })
    }
}
