//! Retrying, rate-limited transport for the HubSpot API
//!
//! Every request waits for a rate-limit permit, carries the bearer token, and
//! is retried on throttling, transient server errors, timeouts and refused
//! connections. Any other non-2xx response is returned as
//! [`Error::HttpStatus`] with the response body.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Wait applied to a 429 without a usable `Retry-After` header
const DEFAULT_RETRY_AFTER_SECS: u64 = 10;

const USER_AGENT: &str = concat!("hubspot-connector/", env!("CARGO_PKG_VERSION"));

/// Transport settings
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Prefix of relative request paths
    pub base_url: Option<String>,
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_type: BackoffType,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// `None` disables rate limiting
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            timeout: Duration::from_secs(30),
            max_retries: 4,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            rate_limit: Some(RateLimiterConfig::default()),
        }
    }
}

impl HttpClientConfig {
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for [`HttpClientConfig`]
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Query and body of one request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, sent in insertion order
    pub query: Vec<(String, String)>,
    /// JSON body
    pub body: Option<Value>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Result of a single attempt
enum Attempt {
    Done(Response),
    /// Worth another try after `delay`, `error` is returned if none is left
    Retry { delay: Duration, error: Error },
    Failed(Error),
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Send a request, retrying transient failures. `url` is either absolute
    /// (a paging link) or a path under the base URL.
    pub async fn request(&self, method: Method, url: &str, request: RequestConfig) -> Result<Response> {
        let url = self.build_url(url);
        let max_retries = self.config.max_retries;

        let mut attempt = 0;
        loop {
            match self.attempt(&method, &url, &request, attempt).await {
                Attempt::Done(response) => {
                    debug!(%method, %url, "request succeeded");
                    return Ok(response);
                }
                Attempt::Retry { delay, error } if attempt < max_retries => {
                    warn!(
                        %method,
                        %url,
                        attempt = attempt + 1,
                        of = max_retries + 1,
                        ?delay,
                        error = %error,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Attempt::Retry { error, .. } | Attempt::Failed(error) => return Err(error),
            }
        }
    }

    /// Send a request and decode the JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        request: RequestConfig,
    ) -> Result<T> {
        let response = self.request(method, url, request).await?;
        Ok(response.json().await?)
    }

    /// GET and decode the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, request: RequestConfig) -> Result<T> {
        self.request_json(Method::GET, url, request).await
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        request: &RequestConfig,
        attempt: u32,
    ) -> Attempt {
        if let Some(limiter) = &self.rate_limiter {
            limiter.wait().await;
        }

        let mut builder = self.client.request(method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &self.config.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry {
                    delay: self.backoff(attempt),
                    error: Error::Timeout {
                        timeout_ms: self.config.timeout.as_millis() as u64,
                    },
                }
            }
            Err(e) if e.is_connect() => {
                return Attempt::Retry {
                    delay: self.backoff(attempt),
                    error: Error::Http(e),
                }
            }
            Err(e) => return Attempt::Failed(Error::Http(e)),
        };

        let status = response.status();
        if status.is_success() {
            return Attempt::Done(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(&response);
            return Attempt::Retry {
                delay: Duration::from_secs(retry_after),
                error: Error::RateLimited {
                    retry_after_seconds: retry_after,
                },
            };
        }

        let body = response.text().await.unwrap_or_default();
        let error = Error::http_status(status.as_u16(), body);
        if error.is_retryable() {
            Attempt::Retry {
                delay: self.backoff(attempt),
                error,
            }
        } else {
            Attempt::Failed(error)
        }
    }

    /// Absolute URLs pass through, paths are joined to the base URL
    pub(super) fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_string(),
        }
    }

    /// Delay before retry number `attempt + 1`, capped at the maximum
    pub(super) fn backoff(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_backoff;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial * (attempt + 1),
            BackoffType::Exponential => initial * 2u32.saturating_pow(attempt),
        };

        delay.min(self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("max_retries", &self.config.max_retries)
            .field("has_bearer_token", &self.config.bearer_token.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

fn retry_after(response: &Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}
