//! HTTP transport for Conduit calls

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{ConduitError, Result};

/// Default timeout for a single Conduit round trip
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One-shot POST transport underneath the call protocol.
///
/// The protocol layer owns URL construction and body shaping; a transport
/// only delivers the body and hands back the response text. Tests substitute
/// scripted implementations for the HTTP-backed one.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` and return the response body as text.
    async fn post(&self, url: &str, body: String) -> Result<String>;
}

/// Transport backed by a pooled reqwest client
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with the default round-trip timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom round-trip timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: String) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConduitError::Transport(format!("HTTP {status}: {body}")));
        }

        Ok(response.text().await?)
    }
}
