use std::time::Duration;

use reqwest::header::CONTENT_LENGTH;
use thiserror::Error;

/// Learns the byte length of a remote audio file.
///
/// The transformer awaits probes one at a time, in item order. Implementations
/// must never fail: anything that prevents learning the size is reported as 0.
#[allow(async_fn_in_trait)]
pub trait LengthProbe {
    async fn probe_length(&self, url: &str) -> u64;
}

/// Probes sizes with an HTTP `HEAD` request and reads `Content-Length`.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn head_content_length(&self, url: &str) -> Result<Option<u64>, ProbeFailure> {
        let response = tokio::time::timeout(self.timeout, self.client.head(url).send())
            .await
            .map_err(|_| ProbeFailure::Timeout)?
            .map_err(|e| ProbeFailure::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProbeFailure::HttpStatus(response.status().as_u16()));
        }

        // Read the header directly: for HEAD there is no body to measure
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }
}

/// Why a probe fell back to zero. Only used for logging.
#[derive(Debug, Error)]
enum ProbeFailure {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Network(String),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

impl LengthProbe for HttpProber {
    async fn probe_length(&self, url: &str) -> u64 {
        match self.head_content_length(url).await {
            Ok(Some(length)) => {
                tracing::debug!(url = %url, length = length, "Probed audio size");
                length
            }
            Ok(None) => {
                tracing::debug!(url = %url, "No usable Content-Length, using size 0");
                0
            }
            Err(failure) => {
                tracing::debug!(url = %url, failure = %failure, "Size probe failed, using size 0");
                0
            }
        }
    }
}
