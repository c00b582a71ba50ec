use crate::util::{validate_url, UrlValidationError};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Largest feed body accepted.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Default per-request timeout for the feed fetch and each size probe.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while fetching the source feed.
///
/// All of these are terminal for a run: no output is written.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source URL is not an absolute http(s) URL
    #[error("Invalid source URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// DNS, connect, TLS or body read failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// The server answered with a non-2xx status
    #[error("Server returned status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Body over `MAX_FEED_SIZE`
    #[error("Feed exceeds the 10 MiB size limit")]
    ResponseTooLarge,
    /// Body shorter than its Content-Length
    #[error("Feed truncated: got {received} of {expected} bytes")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body is not valid UTF-8
    #[error("Feed is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Builds the HTTP client shared by the fetch and the size probes.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(timeout)
        .build()
}

/// Fetches the source feed and returns it as text.
///
/// # Behavior
///
/// - Only absolute `http`/`https` URLs are accepted
/// - `timeout` bounds the whole exchange, headers and body together
/// - Non-2xx statuses fail immediately; there is no retry
/// - Bodies over 10 MiB are rejected
///
/// # Errors
///
/// Returns [`FetchError`] for invalid URLs, network errors, timeouts, bad
/// statuses, oversized or truncated bodies and non-UTF-8 content.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    let validated = validate_url(url)?;

    // One deadline covers the request and the body read together
    let bytes = tokio::time::timeout(timeout, get_body(client, validated.as_str()))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

    tracing::debug!(url = %url, bytes = bytes.len(), "Fetched source feed");

    Ok(String::from_utf8(bytes)?)
}

async fn get_body(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }
    read_limited_bytes(response, MAX_FEED_SIZE).await
}

/// Collects the body, stopping as soon as it grows past `limit`.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let declared = response.content_length();
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(FetchError::ResponseTooLarge);
    }

    let mut body = Vec::with_capacity(declared.map_or(0, |len| len as usize));
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len() + chunk.len() > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    // EDGE-005: connection closed before the declared length arrived
    match declared {
        Some(expected) if (body.len() as u64) < expected => Err(FetchError::IncompleteResponse {
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}
