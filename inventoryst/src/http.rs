//! Shared HTTP client for platform connectors.
//!
//! Every outbound request goes through [`ApiClient`], which
//! - sends the Inventoryst `User-Agent` plus the connector's default headers
//! - counts each request attempt (reported as the job's API calls)
//! - retries `429 Too Many Requests`, honouring `Retry-After` when present and
//!   backing off exponentially otherwise
//! - turns any other non-success status into [`ApiError::Status`]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Inventoryst/1.0; https://github.com/unfoldingWord/inventoryst";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum ApiError {
    /// The HTTP client itself could not be built.
    Client(reqwest::Error),
    /// A header value contained characters HTTP does not allow.
    InvalidHeader(String),
    /// Transport failure (DNS, TLS, timeout, ...).
    Request { url: String, source: reqwest::Error },
    /// Still rate limited after the last attempt.
    RateLimited { url: String, attempts: u32 },
    /// Any other non-success status.
    Status { url: String, status: u16, body: String },
    /// The body was not the JSON we expected.
    Decode { url: String, source: reqwest::Error },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Client(e) => write!(f, "failed to build HTTP client: {e}"),
            ApiError::InvalidHeader(name) => write!(f, "invalid value for header '{name}'"),
            ApiError::Request { url, source } => write!(f, "request to {url} failed: {source}"),
            ApiError::RateLimited { url, attempts } => {
                write!(f, "rate limited by {url} after {attempts} attempts")
            }
            ApiError::Status { url, status, body } => {
                write!(f, "{url} returned HTTP {status}: {body}")
            }
            ApiError::Decode { url, source } => {
                write!(f, "unexpected response body from {url}: {source}")
            }
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Client(source)
            | ApiError::Request { source, .. }
            | ApiError::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Backoff applied to rate-limited requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    /// Upper bound for any single wait, including server-requested ones.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based) when the server gave no hint.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// `Retry-After` as a number of seconds. HTTP dates are not supported.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Builds an `Authorization` header map, e.g. `authorization("Bearer", key)`.
pub fn authorization(scheme: &str, credential: &str) -> Result<HeaderMap, ApiError> {
    let mut value = HeaderValue::from_str(&format!("{scheme} {credential}"))
        .map_err(|_| ApiError::InvalidHeader("Authorization".to_string()))?;
    value.set_sensitive(true);
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("authorization"), value);
    Ok(headers)
}

pub struct ApiClient {
    http: reqwest::Client,
    default_headers: RwLock<HeaderMap>,
    retry: RetryPolicy,
    calls: AtomicU64,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("headers", &self.headers().keys().collect::<Vec<_>>())
            .field("retry", &self.retry)
            .field("calls", &self.call_count())
            .finish()
    }
}

impl ApiClient {
    pub fn new(default_headers: HeaderMap) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            default_headers: RwLock::new(default_headers),
            retry: RetryPolicy::default(),
            calls: AtomicU64::new(0),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the default headers, e.g. once a bearer token has been obtained.
    pub fn set_default_headers(&self, headers: HeaderMap) {
        match self.default_headers.write() {
            Ok(mut current) => *current = headers,
            Err(poisoned) => *poisoned.into_inner() = headers,
        }
    }

    fn headers(&self) -> HeaderMap {
        match self.default_headers.read() {
            Ok(headers) => headers.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Requests sent so far, retries included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.send(url, || self.http.get(url)).await?;
        decode(url, response).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(url, || self.http.post(url).json(body)).await?;
        decode(url, response).await
    }

    async fn send(
        &self,
        url: &str,
        request: impl Fn() -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        let mut attempt = 1;
        loop {
            self.calls.fetch_add(1, Ordering::Relaxed);
            debug!(url, attempt, "Sending API request");
            let response = request()
                .headers(self.headers())
                .send()
                .await
                .map_err(|source| ApiError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt >= self.retry.max_attempts {
                    warn!(url, attempts = attempt, "Still rate limited, giving up");
                    return Err(ApiError::RateLimited {
                        url: url.to_string(),
                        attempts: attempt,
                    });
                }
                let delay = retry_after(response.headers())
                    .map(|d| d.min(self.retry.max_delay))
                    .unwrap_or_else(|| self.retry.backoff(attempt));
                warn!(
                    url,
                    attempt,
                    max_attempts = self.retry.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                sleep(delay).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                });
            }
            return Ok(response);
        }
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}
