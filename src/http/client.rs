//! Retrying HTTP client
//!
//! Every request goes through [`HttpClient::send`]. Each attempt is classified
//! as done, retryable or fatal; retryable attempts are repeated under the
//! client's [`RetryPolicy`] until it runs out.

use super::auth::Authenticator;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_USER_AGENT: &str = concat!("relay-cdk/", env!("CARGO_PKG_VERSION"));

/// How failed requests are repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 sends every request once
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each following one
    pub base_delay: Duration,
    /// Upper bound for any delay, including a server's Retry-After
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry`, counted from zero
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Delay honoring a server-requested wait when there is one
    pub fn wait(&self, requested: Option<Duration>, retry: u32) -> Duration {
        match requested {
            Some(requested) => requested.min(self.max_delay),
            None => self.delay(retry),
        }
    }
}

/// Connection settings shared by every request of a client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Prefix for relative request paths
    pub base_url: String,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retry behaviour
    pub retry: RetryPolicy,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Overrides the `relay-cdk/<version>` user agent
    pub user_agent: Option<String>,
}

impl ClientSettings {
    /// Settings with default timeout and retries for `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            headers: BTreeMap::new(),
            user_agent: None,
        }
    }
}

/// A GET request against the client's base URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    /// Path relative to the base URL, or an absolute URL
    pub path: String,
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// Extra headers for this request
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    /// Request for `path`
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Result of a single attempt
enum Attempt {
    Done(Response),
    Retry { error: Error, wait: Option<Duration> },
    Fail(Error),
}

/// Authenticated HTTP client with retries
pub struct HttpClient {
    inner: Client,
    settings: ClientSettings,
    authenticator: Authenticator,
}

impl HttpClient {
    /// Build a client; credentials are applied to every attempt
    pub fn new(settings: ClientSettings, authenticator: Authenticator) -> Result<Self> {
        let inner = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        Ok(Self {
            inner,
            settings,
            authenticator,
        })
    }

    /// The client's settings
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Resolve a request path against the base URL
    pub fn url_for(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }

        let base = self.settings.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        };
        Ok(Url::parse(&joined)?)
    }

    /// Send `request`, retrying transport failures and retryable statuses.
    ///
    /// When retries run out the last attempt's error is returned.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let url = self.url_for(&request.path)?;
        let policy = self.settings.retry;

        let mut retry = 0;
        loop {
            match self.attempt(&url, request).await {
                Attempt::Done(response) => return Ok(response),
                Attempt::Fail(error) => return Err(error),
                Attempt::Retry { error, wait } if retry < policy.max_retries => {
                    let delay = policy.wait(wait, retry);
                    retry += 1;
                    warn!(
                        "GET {} failed ({error}), retry {retry}/{} in {delay:?}",
                        url.path(),
                        policy.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retry { error, .. } => {
                    debug!("Giving up on GET {} after {retry} retries", url.path());
                    return Err(error);
                }
            }
        }
    }

    /// Send `request` and parse the body as JSON
    pub async fn fetch_json(&self, request: &ApiRequest) -> Result<JsonValue> {
        let body = self
            .send(request)
            .await?
            .text()
            .await
            .map_err(|e| Error::decode(format!("Failed to read response body: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("Response is not valid JSON: {e}")))
    }

    async fn attempt(&self, url: &Url, request: &ApiRequest) -> Attempt {
        let mut builder = self.inner.get(url.clone());
        for (name, value) in &self.settings.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        let builder = self.authenticator.apply(builder);

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                let timeout_ms = u64::try_from(self.settings.timeout.as_millis()).unwrap_or(u64::MAX);
                return Attempt::Retry {
                    error: Error::Timeout { timeout_ms },
                    wait: None,
                };
            }
            Err(e) if e.is_connect() => {
                return Attempt::Retry {
                    error: Error::Http(e),
                    wait: None,
                }
            }
            Err(e) => return Attempt::Fail(Error::Http(e)),
        };

        let status = response.status();
        if !(status.is_client_error() || status.is_server_error()) {
            return Attempt::Done(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after(&response);
            return Attempt::Retry {
                error: Error::RateLimited {
                    retry_after_seconds: wait.map_or(0, |d| d.as_secs()),
                },
                wait,
            };
        }

        let body = response.text().await.unwrap_or_default();
        let error = Error::http_status(status.as_u16(), body);
        if error.is_retryable() {
            Attempt::Retry { error, wait: None }
        } else {
            Attempt::Fail(error)
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("settings", &self.settings)
            .field("authenticator", &self.authenticator)
            .finish_non_exhaustive()
    }
}

/// Seconds requested by a Retry-After header
fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get(reqwest::header::RETRY_AFTER)?;
    let seconds: u64 = value.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}
