//! Rate-limited tile fetching.
//!
//! [`FetchClient`] performs exactly one GET per call, always preceded by a
//! randomized delay, and classifies the result into a [`TileOutcome`]. It
//! holds no state between calls; pacing comes entirely from the delay and
//! from callers issuing requests sequentially.
//!
//! # Outcome Classification
//!
//! | Response | Outcome |
//! |---|---|
//! | 200, body length == `blocked_tile_size` | `Blocked` (bytes returned) |
//! | 200, any other length | `Success` |
//! | any other status | `Failed` |
//! | timeout | `Timeout` |
//! | connection or protocol failure | `Error` |

use std::time::Duration;

use bytes::Bytes;
use rand::Rng;
use tracing::{debug, warn};

use crate::provider::{
    AsyncHttpClient, LayerConfig, ProviderError, ReqwestClient, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT,
};
use crate::tile::{TileKey, TileOutcome};

/// Default minimum pre-request delay in seconds.
pub const DEFAULT_MIN_DELAY_SECS: f64 = 3.0;

/// Default maximum pre-request delay in seconds.
pub const DEFAULT_MAX_DELAY_SECS: f64 = 5.0;

/// Byte length of the placeholder image OpenStreetMap serves to clients it
/// is throttling.
pub const DEFAULT_BLOCKED_TILE_SIZE: u64 = 7412;

/// Configuration for the fetch client.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Lower bound of the pre-request delay.
    pub min_delay: Duration,
    /// Upper bound of the pre-request delay.
    pub max_delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Body length identifying the placeholder image.
    pub blocked_tile_size: u64,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs_f64(DEFAULT_MIN_DELAY_SECS),
            max_delay: Duration::from_secs_f64(DEFAULT_MAX_DELAY_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            blocked_tile_size: DEFAULT_BLOCKED_TILE_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    /// Same configuration with no pre-request delay.
    pub fn without_delay(mut self) -> Self {
        self.min_delay = Duration::ZERO;
        self.max_delay = Duration::ZERO;
        self
    }

    /// Builds the production HTTP client for this configuration.
    pub fn http_client(&self) -> Result<ReqwestClient, ProviderError> {
        ReqwestClient::with_config(self.timeout, &self.user_agent)
    }

    /// Mean of the delay bounds, used for duration estimates.
    pub fn mean_delay(&self) -> Duration {
        (self.min_delay + self.max_delay.max(self.min_delay)) / 2
    }
}

/// Result of one fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Classified outcome.
    pub outcome: TileOutcome,
    /// URL that was requested.
    pub url: String,
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Body to persist; set for `Success` and `Blocked` only.
    pub bytes: Option<Bytes>,
    /// Failure description for `Failed`, `Timeout` and `Error`.
    pub error: Option<String>,
}

/// Sequential, politely paced tile fetcher.
pub struct FetchClient<C: AsyncHttpClient> {
    http_client: C,
    config: FetchConfig,
}

impl<C: AsyncHttpClient> FetchClient<C> {
    /// Creates a new fetch client.
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client for making requests
    /// * `config` - Delay, timeout and placeholder settings
    pub fn new(http_client: C, config: FetchConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Draws the pre-request delay uniformly from `[min_delay, max_delay]`.
    fn draw_delay(&self) -> Duration {
        let min = self.config.min_delay.as_secs_f64();
        let max = self.config.max_delay.as_secs_f64();
        if max <= min {
            return self.config.min_delay;
        }
        Duration::from_secs_f64(rand::rng().random_range(min..=max))
    }

    /// Fetches one tile.
    ///
    /// Sleeps first, unconditionally, then issues a single GET. Never
    /// retries; every failure is reported as an outcome, not an error.
    pub async fn fetch(&self, layer: &LayerConfig, key: &TileKey) -> FetchResult {
        let delay = self.draw_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let url = layer.build_url(key);
        debug!(tile = %key, url = %url, delay_ms = delay.as_millis() as u64, "Fetching tile");

        match self.http_client.get(&url).await {
            Ok(response) if response.is_ok() => {
                let outcome = if response.body.len() as u64 == self.config.blocked_tile_size {
                    warn!(tile = %key, bytes = response.body.len(), "Server returned blocked placeholder");
                    TileOutcome::Blocked
                } else {
                    TileOutcome::Success
                };
                FetchResult {
                    outcome,
                    url,
                    status: Some(response.status),
                    bytes: Some(response.body),
                    error: None,
                }
            }
            Ok(response) => FetchResult {
                outcome: TileOutcome::Failed,
                error: Some(format!("HTTP {}", response.status)),
                url,
                status: Some(response.status),
                bytes: None,
            },
            Err(ProviderError::Timeout(msg)) => FetchResult {
                outcome: TileOutcome::Timeout,
                url,
                status: None,
                bytes: None,
                error: Some(msg),
            },
            Err(e) => FetchResult {
                outcome: TileOutcome::Error,
                url,
                status: None,
                bytes: None,
                error: Some(e.to_string()),
            },
        }
    }
}
