//! HTTP client for provider APIs
//!
//! Builds `reqwest` clients with timeouts and an optional proxy, and sends
//! JSON GET requests with bounded retry on transient failures.

use rand::Rng;
use reqwest::{Client, Proxy, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Upper bound for a single backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Characters of an error body kept in error messages
const MAX_BODY_SNIPPET: usize = 200;

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retries per request (after the first attempt)
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub backoff_base_ms: u64,
    /// Optional proxy URL (http://, https://, socks5h://)
    pub proxy: Option<String>,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            backoff_base_ms: 500,
            proxy: None,
            user_agent: format!("threatfusion/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Errors from the HTTP transport
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Request could not be cloned for retry")]
    NotCloneable,

    #[error("Not found (404)")]
    NotFound,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Max retries ({0}) exceeded: {1}")]
    MaxRetries(u32, String),

    #[error("Invalid JSON response: {0}")]
    Decode(String),
}

impl HttpError {
    /// Status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::NotFound => Some(404),
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Create a configured HTTP client
pub fn create_http_client(config: &HttpConfig) -> Result<Client, HttpError> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone());

    if let Some(proxy_url) = &config.proxy {
        let proxy = Proxy::all(proxy_url).map_err(|e| HttpError::ClientBuild(e.to_string()))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| HttpError::ClientBuild(e.to_string()))
}

/// Shared HTTP client with retry policy
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        let client = create_http_client(&config)?;
        Ok(Self { client, config })
    }

    /// Underlying client, for building requests
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send a request and decode the JSON body.
    ///
    /// 429, 5xx, connect errors and timeouts are retried up to
    /// `max_retries` times; 404 maps to [`HttpError::NotFound`].
    pub async fn get_json(&self, request: RequestBuilder) -> Result<Value, HttpError> {
        let response = self.send_with_retry(request).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| HttpError::Decode(e.to_string()))
    }

    async fn send_with_retry(&self, request: RequestBuilder) -> Result<Response, HttpError> {
        let mut last_error = String::new();

        for attempt in 0..=self.config.max_retries {
            let attempt_request = request.try_clone().ok_or(HttpError::NotCloneable)?;

            let retry_after = match attempt_request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response);
                    }

                    if !is_retryable_status(status) {
                        return Err(status_error(response).await);
                    }

                    warn!("Transient HTTP {} (attempt {})", status.as_u16(), attempt + 1);
                    last_error = format!("HTTP {}", status.as_u16());
                    retry_after_header(&response)
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!("Transient request error (attempt {}): {}", attempt + 1, e);
                    last_error = e.to_string();
                    None
                }
                Err(e) => return Err(HttpError::Request(e)),
            };

            if attempt < self.config.max_retries {
                let delay = retry_after.unwrap_or_else(|| {
                    backoff_delay(self.config.backoff_base_ms, attempt, jitter(self.config.backoff_base_ms))
                });
                debug!("Retrying in {:?}", delay);
                sleep(delay.min(MAX_BACKOFF)).await;
            }
        }

        Err(HttpError::MaxRetries(self.config.max_retries, last_error))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn status_error(response: Response) -> HttpError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return HttpError::NotFound;
    }

    let body = response.text().await.unwrap_or_default();
    HttpError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_BODY_SNIPPET).collect(),
    }
}

fn retry_after_header(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn jitter(base_ms: u64) -> Duration {
    let max = (base_ms / 2).max(1);
    Duration::from_millis(rand::thread_rng().gen_range(0..max))
}

/// Exponential backoff: `base * 2^attempt + jitter`, capped
pub fn backoff_delay(base_ms: u64, attempt: u32, jitter: Duration) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(16));
    (Duration::from_millis(exp) + jitter).min(MAX_BACKOFF)
}
