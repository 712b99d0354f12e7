//! Retrying JSON-over-HTTP transport shared by the content gateway, direct
//! metadata fetches and the search index client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Delay before retry `n` (the last entry repeats).
pub const DEFAULT_RETRY_SCHEDULE: [Duration; 6] = [
    Duration::from_millis(10),
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(20),
];

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot build request url for {0:?}")]
    InvalidUrl(String),

    #[error("invalid header {0:?}")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl HttpError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request() || source.is_body()
            }
            HttpError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

/// JSON request/response seam. Production code uses `HttpClient`; tests
/// substitute recording fakes.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    /// GET `path`, relative to the transport's base URL or absolute.
    /// An empty or `null` body comes back as `None`.
    async fn get_json(&self, path: &str) -> Result<Option<Value>, HttpError>;

    async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>, HttpError>;
}

#[derive(Debug, Clone)]
pub struct HttpClientOptions {
    pub base_url: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Retries after the first attempt; 0 sends each request once
    pub retry_attempts: u32,
    pub timeout: Duration,
    pub retry_schedule: Vec<Duration>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Vec::new(),
            retry_attempts: 5,
            timeout: Duration::from_secs(30),
            retry_schedule: DEFAULT_RETRY_SCHEDULE.to_vec(),
        }
    }
}

pub struct HttpClient {
    client: reqwest::Client,
    headers: HeaderMap,
    base_url: Option<String>,
    max_attempts: u32,
    retry_schedule: Vec<Duration>,
}

impl HttpClient {
    pub fn new(options: HttpClientOptions) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| HttpError::InvalidHeader(name.to_string()))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(HttpError::Client)?;

        Ok(Self {
            client,
            headers,
            base_url: options.base_url,
            max_attempts: options.retry_attempts.saturating_add(1),
            retry_schedule: options.retry_schedule,
        })
    }

    /// Absolute URL for `path`. Absolute http(s) paths pass through untouched.
    pub fn url_for(&self, path: &str) -> Result<String, HttpError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        match &self.base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            )),
            None => Err(HttpError::InvalidUrl(path.to_string())),
        }
    }

    pub(crate) fn build_request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request, HttpError> {
        let mut builder = self.client.request(method, url).headers(self.headers.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.build().map_err(|source| HttpError::Network {
            url: url.to_string(),
            source,
        })
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_schedule
            .get(attempt as usize)
            .or(self.retry_schedule.last())
            .copied()
            .unwrap_or_default()
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>, HttpError> {
        let url = self.url_for(path)?;
        let mut attempt = 0;

        loop {
            let request = self.build_request(method.clone(), &url, body)?;
            match self.send(request, &url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        error = %e,
                        "Request failed, retrying in {:?}", delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, request: reqwest::Request, url: &str) -> Result<Option<Value>, HttpError> {
        let network = |source| HttpError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.execute(request).await.map_err(network)?;
        let status = response.status();
        let text = response.text().await.map_err(network)?;

        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            debug!(url, "Empty response body");
            return Ok(None);
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(source) => Err(HttpError::Decode {
                url: url.to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl JsonTransport for HttpClient {
    async fn get_json(&self, path: &str) -> Result<Option<Value>, HttpError> {
        self.request(Method::GET, path, None).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Option<Value>, HttpError> {
        self.request(Method::POST, path, Some(body)).await
    }
}
