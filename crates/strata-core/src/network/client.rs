//! HTTP client with rate limiting awareness.
//!
//! Wraps reqwest with:
//! - `Retry-After` tracking from 429 responses
//! - Holding back requests until the store's retry window has passed
//! - Default headers (API key) applied to every request
//! - Mapping of error responses to [`StrataError`]

use crate::config::{AppConfig, NetworkConfig};
use crate::error::{Result, StrataError};
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use url::Url;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Rate limit state from the last 429 response.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    /// Unix time in milliseconds before which requests are held back.
    pub blocked_until: Option<u64>,
}

impl RateLimitState {
    /// Throttle while the store's retry window is open.
    pub fn should_throttle(&self) -> bool {
        self.time_until_reset().is_some()
    }

    /// Get time until the retry window closes.
    pub fn time_until_reset(&self) -> Option<Duration> {
        let until = self.blocked_until?;
        let now = now_millis();
        (until > now).then(|| Duration::from_millis(until - now))
    }
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct StoreErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
    hint: Option<String>,
}

/// HTTP client with rate limiting awareness.
pub struct HttpClient {
    client: Client,
    blocked_until: AtomicU64,
    default_timeout: Duration,
    max_throttle: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_options(NetworkConfig::REQUEST_TIMEOUT, HeaderMap::new())
    }

    /// Create a client with a timeout and headers sent on every request.
    pub fn with_options(timeout: Duration, default_headers: HeaderMap) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(AppConfig::USER_AGENT)
            .default_headers(default_headers)
            .build()
            .map_err(|e| StrataError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            blocked_until: AtomicU64::new(0),
            default_timeout: timeout,
            max_throttle: NetworkConfig::MAX_THROTTLE,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Get the current rate limit state.
    pub fn rate_limit_state(&self) -> RateLimitState {
        let blocked_until = self.blocked_until.load(Ordering::SeqCst);
        RateLimitState {
            blocked_until: (blocked_until > 0).then_some(blocked_until),
        }
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        self.maybe_throttle().await;

        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StrataError::Timeout(self.default_timeout)
                } else {
                    StrataError::Network {
                        message: format!("GET {} failed: {}", url.path(), e),
                        cause: std::error::Error::source(&e).map(|s| s.to_string()),
                    }
                }
            })?;

        let response = self.check_response_status(response, url).await?;

        response.json::<T>().await.map_err(|e| StrataError::Json {
            message: format!("Failed to decode response from {}: {}", url.path(), e),
        })
    }

    // Internal methods

    async fn maybe_throttle(&self) {
        if let Some(wait) = self.rate_limit_state().time_until_reset() {
            let wait = wait.min(self.max_throttle);
            warn!("Store asked to retry later, throttling for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Hold back requests for `secs` seconds.
    fn note_retry_after(&self, secs: u64) {
        let until = now_millis().saturating_add(secs.saturating_mul(1000));
        self.blocked_until.fetch_max(until, Ordering::SeqCst);
    }

    async fn check_response_status(&self, response: Response, url: &Url) -> Result<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            if let Some(secs) = retry_after {
                self.note_retry_after(secs);
            }

            return Err(StrataError::RateLimited {
                service: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(store_error(status, &body))
    }
}

/// Build a store error from a failed response, preferring PostgREST's message.
fn store_error(status: StatusCode, body: &str) -> StrataError {
    let parsed = serde_json::from_str::<StoreErrorBody>(body).ok();
    let (message, code) = match parsed {
        Some(StoreErrorBody {
            message: Some(message),
            code,
            details,
            hint,
        }) => {
            let mut message = message;
            if let Some(details) = details.filter(|d| !d.is_empty()) {
                message.push_str(&format!(" ({})", details));
            }
            if let Some(hint) = hint.filter(|h| !h.is_empty()) {
                message.push_str(&format!(". Hint: {}", hint));
            }
            (message, code)
        }
        _ if !body.trim().is_empty() => (body.trim().to_string(), None),
        _ => (
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
            None,
        ),
    };

    StrataError::Store {
        status: status.as_u16(),
        message,
        code,
    }
}
