//! HTTP client abstraction for testability

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::types::{HttpResponse, ProviderError};

/// Default User-Agent sent with every tile request.
///
/// Public tile servers require a descriptive agent identifying the
/// application; generic library agents are routinely refused.
pub const DEFAULT_USER_AGENT: &str =
    "DisasterReliefMappingSystem/1.0 (offline tile acquisition)";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Trait for asynchronous HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs exactly one HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The status and body for any completed exchange (including non-200
    /// statuses), or an error when no response was obtained.
    fn get(&self, url: &str) -> impl Future<Output = Result<HttpResponse, ProviderError>> + Send;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default timeout and User-Agent.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            DEFAULT_USER_AGENT,
        )
    }

    /// Creates a new ReqwestClient with a custom timeout and User-Agent.
    pub fn with_config(timeout: Duration, user_agent: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

fn classify_error(url: &str, e: reqwest::Error) -> ProviderError {
    warn!(
        url = url,
        error = %e,
        is_connect = e.is_connect(),
        is_timeout = e.is_timeout(),
        "HTTP request failed"
    );
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Transport(e.to_string())
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
        trace!(url = url, "HTTP GET request starting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status().as_u16();
        debug!(url = url, status = status, "HTTP response received");

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, e))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::time::Instant;

    /// Mock HTTP client for testing.
    ///
    /// Replays queued responses in order and falls back to `default` once
    /// the queue is empty. Every request is logged with the (Tokio) time it
    /// was made.
    #[derive(Clone)]
    pub struct MockAsyncHttpClient {
        pub default: Result<HttpResponse, ProviderError>,
        queued: Arc<Mutex<VecDeque<Result<HttpResponse, ProviderError>>>>,
        requests: Arc<Mutex<Vec<(String, Instant)>>>,
    }

    impl MockAsyncHttpClient {
        /// Always answers with `response`.
        pub fn returning(response: Result<HttpResponse, ProviderError>) -> Self {
            Self {
                default: response,
                queued: Arc::new(Mutex::new(VecDeque::new())),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Always answers 200 with a body of `len` bytes.
        pub fn ok_with_len(len: usize) -> Self {
            Self::returning(Ok(HttpResponse::new(200, vec![0x89; len])))
        }

        /// Queues a response ahead of the default.
        pub fn push(&self, response: Result<HttpResponse, ProviderError>) {
            self.queued.lock().push_back(response);
        }

        /// URLs requested so far.
        pub fn urls(&self) -> Vec<String> {
            self.requests.lock().iter().map(|(u, _)| u.clone()).collect()
        }

        /// Times at which requests were made.
        pub fn request_times(&self) -> Vec<Instant> {
            self.requests.lock().iter().map(|(_, t)| *t).collect()
        }

        /// Number of requests made.
        pub fn request_count(&self) -> usize {
            self.requests.lock().len()
        }
    }

    impl AsyncHttpClient for MockAsyncHttpClient {
        async fn get(&self, url: &str) -> Result<HttpResponse, ProviderError> {
            self.requests.lock().push((url.to_string(), Instant::now()));
            let queued = self.queued.lock().pop_front();
            queued.unwrap_or_else(|| self.default.clone())
        }
    }

    #[tokio::test]
    async fn test_mock_client_replays_queue_then_default() {
        let mock = MockAsyncHttpClient::ok_with_len(4);
        mock.push(Ok(HttpResponse::new(404, Vec::new())));

        let first = mock.get("http://example.com/1").await.unwrap();
        let second = mock.get("http://example.com/2").await.unwrap();

        assert_eq!(first.status, 404);
        assert_eq!(second.status, 200);
        assert_eq!(second.body.len(), 4);
        assert_eq!(
            mock.urls(),
            vec!["http://example.com/1", "http://example.com/2"]
        );
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let mock =
            MockAsyncHttpClient::returning(Err(ProviderError::Timeout("Test timeout".to_string())));

        let result = mock.get("http://example.com").await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestClient::new().is_ok());
        assert!(ReqwestClient::with_config(Duration::from_secs(5), "test-agent/1.0").is_ok());
    }
}
